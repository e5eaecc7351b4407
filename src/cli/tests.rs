use super::*;
use crate::core::config::data::DEFAULT_MODEL;
use tempfile::TempDir;

mod test_helpers {
    use super::*;

    pub(super) fn parse_args(argv: &[&str]) -> Args {
        Args::try_parse_from(argv)
            .unwrap_or_else(|err| panic!("argv={argv:?} should parse successfully: {err}"))
    }
}

use test_helpers::parse_args;

#[test]
fn no_subcommand_means_chat() {
    let args = parse_args(&["sensai"]);
    assert!(args.command.is_none());
    assert!(args.model.is_none());
}

#[test]
fn ask_collects_the_whole_question() {
    let argv = ["sensai", "ask", "--save", "What", "is", "gravity?"];
    match parse_args(&argv).command {
        Some(Commands::Ask {
            image,
            save,
            no_reveal,
            query,
        }) => {
            assert_eq!(image, None);
            assert!(save);
            assert!(!no_reveal);
            assert_eq!(query.join(" "), "What is gravity?");
        }
        _ => panic!("argv={argv:?} should parse as ask"),
    }
}

#[test]
fn ask_requires_a_question() {
    assert!(Args::try_parse_from(["sensai", "ask"]).is_err());
}

#[test]
fn chat_accepts_an_image_and_optional_first_question() {
    let argv = ["sensai", "chat", "-i", "diagram.png", "Explain", "this"];
    match parse_args(&argv).command {
        Some(Commands::Chat { image, query, .. }) => {
            assert_eq!(image.as_deref(), Some("diagram.png"));
            assert_eq!(query, vec!["Explain", "this"]);
        }
        _ => panic!("argv={argv:?} should parse as chat"),
    }
}

#[test]
fn global_flags_work_after_the_subcommand() {
    let args = parse_args(&[
        "sensai",
        "notes",
        "--model",
        "tiny-model",
        "--data-dir",
        "/tmp/sensai",
        "-l",
        "sensai.log",
    ]);
    assert_eq!(args.model.as_deref(), Some("tiny-model"));
    assert_eq!(args.data_dir, Some(PathBuf::from("/tmp/sensai")));
    assert_eq!(args.log, Some(PathBuf::from("sensai.log")));
    assert!(matches!(args.command, Some(Commands::Notes { action: None })));
}

#[test]
fn study_room_actions_parse() {
    match parse_args(&["sensai", "notes", "delete", "2"]).command {
        Some(Commands::Notes { action }) => {
            assert_eq!(action, Some(NotesAction::Delete { number: 2 }));
        }
        _ => panic!("should parse as notes"),
    }

    match parse_args(&["sensai", "notes", "search", "black", "holes"]).command {
        Some(Commands::Notes { action }) => assert_eq!(
            action,
            Some(NotesAction::Search {
                term: vec!["black".into(), "holes".into()]
            })
        ),
        _ => panic!("should parse as notes search"),
    }

    match parse_args(&["sensai", "videos", "add", "abc123", "Gravity", "explained"]).command {
        Some(Commands::Videos {
            action: Some(VideosAction::Add { id, title, .. }),
        }) => {
            assert_eq!(id, "abc123");
            assert_eq!(title.join(" "), "Gravity explained");
        }
        _ => panic!("should parse as videos add"),
    }

    match parse_args(&["sensai", "images", "upload", "cat.png", "--name", "Cat"]).command {
        Some(Commands::Images { action }) => assert_eq!(
            action,
            Some(ImagesAction::Upload {
                path: "cat.png".into(),
                name: Some("Cat".into())
            })
        ),
        _ => panic!("should parse as images upload"),
    }
}

#[test]
fn config_set_joins_multi_word_values() {
    match parse_args(&["sensai", "config", "set", "model", "my", "model"]).command {
        Some(Commands::Config { action }) => assert_eq!(
            action,
            Some(ConfigAction::Set {
                key: "model".into(),
                value: vec!["my".into(), "model".into()]
            })
        ),
        _ => panic!("should parse as config set"),
    }
}

#[test]
fn overrides_apply_on_top_of_file_config() {
    let args = parse_args(&["sensai", "--model", "other", "--base-url", "http://localhost:8080/v1"]);
    let config = apply_overrides(Config::default(), &args);
    assert_eq!(config.model(), "other");
    assert_eq!(config.base_url(), "http://localhost:8080/v1");

    let blank = parse_args(&["sensai", "--model", " "]);
    assert_eq!(apply_overrides(Config::default(), &blank).model(), DEFAULT_MODEL);
}

#[test]
fn config_set_and_unset_persist_to_the_given_file() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("config.toml");

    run_config(
        path.clone(),
        Some(ConfigAction::Set {
            key: "reveal-interval-ms".into(),
            value: vec!["5".into()],
        }),
    )
    .unwrap();
    assert_eq!(
        Config::load_from_path(&path).unwrap().reveal_interval_ms,
        Some(5)
    );

    run_config(
        path.clone(),
        Some(ConfigAction::Unset {
            key: "reveal-interval-ms".into(),
        }),
    )
    .unwrap();
    assert_eq!(Config::load_from_path(&path).unwrap(), Config::default());

    assert!(run_config(
        path,
        Some(ConfigAction::Set {
            key: "theme".into(),
            value: vec!["dark".into()],
        }),
    )
    .is_err());
}

#[test]
fn settings_open_the_store_in_the_data_dir() {
    let temp_dir = TempDir::new().unwrap();
    let settings = Settings {
        client: reqwest::Client::new(),
        config: Config {
            data_dir: Some(temp_dir.path().to_path_buf()),
            ..Config::default()
        },
        config_path: temp_dir.path().join("config.toml"),
    };
    assert_eq!(settings.open_store().unwrap().root(), temp_dir.path());
}
