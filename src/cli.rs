//! Command-line interface for administering the media store.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "mediavault", version, about = "Store, inspect and delete uploaded files")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Create the storage directory tree for the current month
    Init,

    /// Upload a local file
    Upload {
        /// File to upload
        file: PathBuf,

        /// Declared content type; guessed from the file name when omitted
        #[arg(long)]
        content_type: Option<String>,

        /// Original name to record; defaults to the file's name
        #[arg(long)]
        name: Option<String>,
    },

    /// List stored files, newest first
    List {
        #[arg(long, default_value_t = 20)]
        limit: i64,

        #[arg(long, default_value_t = 0)]
        offset: i64,
    },

    /// Show a file record
    Show { uuid: String },

    /// Print the absolute path of a stored file
    Path {
        uuid: String,

        /// Print the thumbnail path instead of the original
        #[arg(long)]
        thumbnail: bool,
    },

    /// Delete a file, its thumbnail and its record
    Delete { uuid: String },

    /// Set the alt text of an image; omit TEXT to clear it
    AltText { uuid: String, text: Option<String> },
}

/// Content type to declare for `file`: the explicit value, or a guess from its extension.
pub fn resolve_content_type(file: &std::path::Path, explicit: Option<String>) -> String {
    explicit.unwrap_or_else(|| {
        mime_guess::from_path(file)
            .first()
            .map(|m| m.essence_str().to_string())
            .unwrap_or_default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_parse_upload() {
        let cli = Cli::try_parse_from([
            "mediavault",
            "upload",
            "photo.jpg",
            "--content-type",
            "image/jpeg",
        ])
        .unwrap();

        match cli.command {
            Command::Upload {
                file,
                content_type,
                name,
            } => {
                assert_eq!(file, PathBuf::from("photo.jpg"));
                assert_eq!(content_type.as_deref(), Some("image/jpeg"));
                assert!(name.is_none());
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_parse_list_defaults() {
        let cli = Cli::try_parse_from(["mediavault", "list"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::List {
                limit: 20,
                offset: 0
            }
        ));
    }

    #[test]
    fn test_content_type_guess() {
        assert_eq!(resolve_content_type(Path::new("a.png"), None), "image/png");
        assert_eq!(
            resolve_content_type(Path::new("a.png"), Some("text/plain".to_string())),
            "text/plain"
        );
        assert_eq!(resolve_content_type(Path::new("noext"), None), "");
    }
}
