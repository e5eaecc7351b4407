//! `sensai login`, `signup`, `logout` and `whoami`.

use std::error::Error;
use std::io::{self, Write};

use crate::core::profile::Profile;
use crate::core::storage::KeyValueStore;

fn value_or_prompt<P>(value: Option<String>, label: &str, prompt: &mut P) -> io::Result<String>
where
    P: FnMut(&str) -> io::Result<String>,
{
    match value {
        Some(value) => Ok(value),
        None => prompt(label),
    }
}

pub fn run_login<P, W>(
    store: &dyn KeyValueStore,
    email: Option<String>,
    mut prompt: P,
    out: &mut W,
) -> Result<(), Box<dyn Error>>
where
    P: FnMut(&str) -> io::Result<String>,
    W: Write,
{
    let email = value_or_prompt(email, "Email: ", &mut prompt)?;
    let password = prompt("Password: ")?;
    let user = Profile::new(store).login(&email, &password)?;
    writeln!(out, "✅ Logged in as {} ({})", user.name, user.email)?;
    Ok(())
}

pub fn run_signup<P, W>(
    store: &dyn KeyValueStore,
    name: Option<String>,
    email: Option<String>,
    mut prompt: P,
    out: &mut W,
) -> Result<(), Box<dyn Error>>
where
    P: FnMut(&str) -> io::Result<String>,
    W: Write,
{
    let name = value_or_prompt(name, "Name: ", &mut prompt)?;
    let email = value_or_prompt(email, "Email: ", &mut prompt)?;
    let password = prompt("Password: ")?;
    let confirm = prompt("Confirm password: ")?;
    let user = Profile::new(store).signup(&name, &email, &password, &confirm)?;
    writeln!(out, "✅ Welcome, {}! Your study room is ready.", user.name)?;
    Ok(())
}

pub fn run_logout<W: Write>(store: &dyn KeyValueStore, out: &mut W) -> Result<(), Box<dyn Error>> {
    Profile::new(store).logout()?;
    writeln!(out, "✅ Logged out")?;
    Ok(())
}

pub fn run_whoami<W: Write>(store: &dyn KeyValueStore, out: &mut W) -> Result<(), Box<dyn Error>> {
    match Profile::new(store).current_user()? {
        Some(user) => writeln!(out, "{} <{}> (id {})", user.name, user.email, user.id)?,
        None => writeln!(out, "Not logged in.")?,
    }
    Ok(())
}
