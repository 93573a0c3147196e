use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "chatlog")]
#[command(author, version, about = "Chat completions with persistent session history", long_about = None)]
pub struct Cli {
    /// Session whose history is read and extended
    #[arg(long, global = true, default_value = "default")]
    pub session_id: String,

    /// Identity stamped on every stored event
    #[arg(long, global = true, default_value = "local-user")]
    pub user_id: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Send one message within the session
    Chat {
        prompt: String,

        #[arg(short = 's', long)]
        system: Option<String>,
    },

    /// Start an interactive chat on the session
    Interactive {
        #[arg(short = 's', long)]
        system: Option<String>,
    },

    /// Print the stored history of the session
    History {
        /// Print raw JSON events instead of a transcript
        #[arg(long)]
        json: bool,
    },
}
