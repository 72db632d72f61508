use clap::{ArgAction, Parser, Subcommand};
use commands::{auth, config, review, sync};
use review_sync_models::MovieId;

mod commands;
mod logging;
mod output;

#[derive(Parser)]
#[command(name = "moviereview")]
#[command(about = "MovieReview - Write movie reviews offline, send them when you can")]
#[command(version)]
struct Cli {
    /// Enable verbose output (use multiple times for more verbosity: -v, -vv)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Output format
    #[arg(long, global = true, default_value = "human", value_enum)]
    output: output::OutputFormat,

    /// Write logs to the daily-rotated log file instead of stderr
    #[arg(long, global = true, action = ArgAction::SetTrue)]
    log_to_file: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Change fields of a movie's review draft
    #[command(long_about = "Edit the local review draft for a movie. Each flag replaces exactly one field; fields you don't mention are kept. Passing an empty string clears a text field. Nothing is sent to the server.")]
    Edit {
        /// Movie identifier
        movie: MovieId,

        /// Star rating from 1 to 5
        #[arg(long, value_parser = clap::value_parser!(u8).range(1..=5), conflicts_with = "clear_rating")]
        rating: Option<u8>,

        /// Remove the rating
        #[arg(long, action = ArgAction::SetTrue)]
        clear_rating: bool,

        /// What you liked about the movie
        #[arg(long)]
        liked: Option<String>,

        /// What you did not like about the movie
        #[arg(long)]
        disliked: Option<String>,
    },
    /// Submit a movie's review
    #[command(long_about = "Submit the review for a movie. A review needs a rating and at least one comment. If you are not signed in the review is queued and sent automatically after 'moviereview login'.")]
    Submit {
        /// Movie identifier
        movie: MovieId,
    },
    /// Show the review for a movie
    Show {
        /// Movie identifier
        movie: MovieId,

        /// Fetch your review from the server when this device has none
        #[arg(long, action = ArgAction::SetTrue)]
        remote: bool,
    },
    /// List every review stored on this device
    List,
    /// Send every queued review now
    #[command(long_about = "Run a sweep: submit every review you asked to send that has not been accepted yet. Temporary failures are retried with exponential backoff as configured under [sync].")]
    Sync,
    /// Delete an unsubmitted review draft
    Discard {
        /// Movie identifier
        movie: MovieId,

        /// Don't ask for confirmation
        #[arg(short, long, action = ArgAction::SetTrue)]
        yes: bool,
    },
    /// Sign in and send any queued reviews
    Login {
        /// Access token (if not provided, will prompt)
        #[arg(long)]
        token: Option<String>,
    },
    /// Forget the stored access token
    Logout,
    /// View or create the configuration file
    Config {
        #[command(subcommand)]
        cmd: ConfigCommands,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Show the effective configuration and file locations
    Show,
    /// Write a configuration file with default values
    Init {
        /// Overwrite an existing file
        #[arg(long, action = ArgAction::SetTrue)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();

    let log_file = if cli.log_to_file {
        Some(review_sync_config::PathManager::default().log_file())
    } else {
        None
    };
    logging::init_logging_with_file(cli.verbose, cli.quiet, log_file)
        .map_err(|e| color_eyre::eyre::eyre!("{}", e))?;

    let output = output::Output::new(cli.output, cli.quiet);

    match cli.command {
        Commands::Edit {
            movie,
            rating,
            clear_rating,
            liked,
            disliked,
        } => {
            let edits = review::EditArgs {
                rating,
                clear_rating,
                liked,
                disliked,
            };
            review::run_edit(movie, edits, &output).await
        }
        Commands::Submit { movie } => review::run_submit(movie, &output).await,
        Commands::Show { movie, remote } => review::run_show(movie, remote, &output).await,
        Commands::List => review::run_list(&output).await,
        Commands::Sync => sync::run_sync(&output).await,
        Commands::Discard { movie, yes } => review::run_discard(movie, yes, &output).await,
        Commands::Login { token } => auth::run_login(token, &output).await,
        Commands::Logout => auth::run_logout(&output).await,
        Commands::Config { cmd } => config::run_config(cmd, &output).await,
    }
}
