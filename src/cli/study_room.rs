//! `sensai notes`, `sensai videos` and `sensai images`.

use std::error::Error;
use std::io::Write;
use std::path::Path;

use chrono::{DateTime, Local};

use crate::cli::{ImagesAction, NotesAction, VideosAction};
use crate::core::image::{is_remote_url, upload_file, ImageUploader};
use crate::core::profile::Profile;
use crate::core::storage::KeyValueStore;
use crate::core::study_room::{SavedNote, StudyRoom, VideoDetails};

const PREVIEW_CHARS: usize = 60;

/// First line of `text`, cut to `max_chars` characters with an ellipsis.
pub fn preview(text: &str, max_chars: usize) -> String {
    let line = text.lines().next().unwrap_or("").trim();
    if line.chars().count() <= max_chars && !text.trim().contains('\n') {
        return line.to_string();
    }
    let cut: String = line.chars().take(max_chars).collect();
    format!("{}…", cut.trim_end())
}

/// Render a stored RFC 3339 timestamp in local time, or as stored when it does not parse.
pub fn display_timestamp(timestamp: &str) -> String {
    DateTime::parse_from_rfc3339(timestamp)
        .map(|time| {
            time.with_timezone(&Local)
                .format("%Y-%m-%d %H:%M")
                .to_string()
        })
        .unwrap_or_else(|_| timestamp.to_string())
}

fn pick<T>(items: &[T], number: usize, what: &str) -> Result<usize, Box<dyn Error>> {
    if number == 0 || number > items.len() {
        return Err(format!(
            "No {what} #{number}. Run `sensai {what}s` to list them."
        )
        .into());
    }
    Ok(number - 1)
}

/// `notes` pairs each note with its position in the user's full list, so the
/// printed number works with `show` and `delete` even for search results.
fn write_note_list<W: Write>(notes: &[(usize, &SavedNote)], out: &mut W) -> std::io::Result<()> {
    for &(index, note) in notes {
        let marker = if note.image_url.is_some() { " [image]" } else { "" };
        writeln!(
            out,
            "{:>3}. {}  {}{marker}",
            index + 1,
            display_timestamp(&note.timestamp),
            preview(&note.query, PREVIEW_CHARS)
        )?;
    }
    Ok(())
}

pub fn run_notes<W: Write>(
    store: &dyn KeyValueStore,
    action: NotesAction,
    out: &mut W,
) -> Result<(), Box<dyn Error>> {
    let user = Profile::new(store).require_user()?;
    let room = StudyRoom::new(store);

    match action {
        NotesAction::List => {
            let notes = room.notes(&user.id)?;
            if notes.is_empty() {
                writeln!(out, "No saved answers yet. Use /save in a chat or `sensai ask --save`.")?;
            } else {
                let numbered: Vec<_> = notes.iter().enumerate().collect();
                write_note_list(&numbered, out)?;
            }
        }
        NotesAction::Search { term } => {
            let term = term.join(" ");
            let notes = room.notes(&user.id)?;
            let hits: Vec<_> = notes
                .iter()
                .enumerate()
                .filter(|(_, note)| note.matches(&term))
                .collect();
            if hits.is_empty() {
                writeln!(out, "No saved answers match '{term}'.")?;
            } else {
                write_note_list(&hits, out)?;
            }
        }
        NotesAction::Show { number } => {
            let notes = room.notes(&user.id)?;
            let note = &notes[pick(&notes, number, "note")?];
            writeln!(out, "Q: {}", note.query)?;
            if let Some(url) = &note.image_url {
                writeln!(out, "Image: {url}")?;
            }
            writeln!(out, "Saved: {}", display_timestamp(&note.timestamp))?;
            writeln!(out)?;
            writeln!(out, "{}", note.response)?;
        }
        NotesAction::Delete { number } => {
            let notes = room.notes(&user.id)?;
            let note = &notes[pick(&notes, number, "note")?];
            room.delete_note(&user.id, &note.timestamp)?;
            writeln!(out, "✅ Deleted note #{number}")?;
        }
    }
    Ok(())
}

pub fn run_videos<W: Write>(
    store: &dyn KeyValueStore,
    action: VideosAction,
    out: &mut W,
) -> Result<(), Box<dyn Error>> {
    let user = Profile::new(store).require_user()?;
    let room = StudyRoom::new(store);

    match action {
        VideosAction::List => {
            let videos = room.videos(&user.id)?;
            if videos.is_empty() {
                writeln!(out, "No saved videos yet.")?;
            }
            for video in videos {
                writeln!(out, "{}  {}", video.id, video.title)?;
                if !video.description.is_empty() {
                    writeln!(out, "    {}", preview(&video.description, PREVIEW_CHARS))?;
                }
            }
        }
        VideosAction::Add {
            id,
            title,
            thumbnail,
            description,
        } => {
            let saved = room.save_video(
                &user.id,
                VideoDetails {
                    id,
                    title: title.join(" "),
                    thumbnail,
                    description,
                },
            )?;
            writeln!(out, "✅ Saved video: {}", saved.title)?;
        }
        VideosAction::Delete { id } => {
            if room.delete_video(&user.id, &id)? == 0 {
                return Err(format!("No saved video with id '{id}'").into());
            }
            writeln!(out, "✅ Removed video {id}")?;
        }
    }
    Ok(())
}

pub async fn run_images<W: Write>(
    store: &dyn KeyValueStore,
    uploader: &dyn ImageUploader,
    action: ImagesAction,
    out: &mut W,
) -> Result<(), Box<dyn Error>> {
    let user = Profile::new(store).require_user()?;
    let room = StudyRoom::new(store);

    match action {
        ImagesAction::List => {
            let images = room.images(&user.id)?;
            if images.is_empty() {
                writeln!(out, "No uploaded images yet.")?;
            }
            for (index, image) in images.iter().enumerate() {
                writeln!(
                    out,
                    "{:>3}. {}  {}  {}",
                    index + 1,
                    display_timestamp(&image.timestamp),
                    image.name,
                    image.url
                )?;
            }
        }
        ImagesAction::Upload { path, name } => {
            let url = if is_remote_url(&path) {
                path.clone()
            } else {
                upload_file(uploader, Path::new(&path)).await?
            };
            let name = name.unwrap_or_else(|| {
                Path::new(&path)
                    .file_name()
                    .and_then(|name| name.to_str())
                    .unwrap_or("unnamed.png")
                    .to_string()
            });
            let image = room.add_image(&user.id, &url, &name)?;
            writeln!(out, "✅ Stored {}: {}", image.name, image.url)?;
        }
        ImagesAction::Delete { number } => {
            let images = room.images(&user.id)?;
            let image = &images[pick(&images, number, "image")?];
            room.delete_image(&user.id, &image.timestamp)?;
            writeln!(out, "✅ Deleted image #{number}")?;
        }
    }
    Ok(())
}
