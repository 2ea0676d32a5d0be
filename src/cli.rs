use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    name = "podtrack",
    version,
    about = "Track podcast playback and download state"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    Status,
    List,
    Add {
        #[arg(long)]
        guid: String,
        #[arg(long)]
        title: String,
        #[arg(long, default_value_t = 0)]
        podcast_id: i64,
        #[arg(long, default_value = "")]
        description: String,
        #[arg(long, default_value = "")]
        audio: String,
        #[arg(long, default_value = "")]
        cover: String,
        #[arg(long, default_value = "")]
        small_cover: String,
        #[arg(long, default_value_t = 0)]
        publication_date: i64,
        #[arg(long, default_value = "")]
        remote_audio: String,
        #[arg(long, default_value = "")]
        remote_cover: String,
    },
    Mark {
        guid: String,
        #[arg(long)]
        position: i64,
        #[arg(long, default_value = "paused")]
        state: String,
        #[arg(long)]
        duration: Option<i64>,
    },
    Queue {
        guid: String,
    },
    Speed {
        value: f32,
    },
    Download {
        guid: String,
    },
    Downloaded {
        guid: String,
    },
    Delete {
        guid: String,
    },
    DebugLog {
        enabled: bool,
    },
}
