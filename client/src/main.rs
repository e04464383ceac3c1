use anyhow::{Context, Result};
use clap::{App, Arg};
use puzzle_scores_client::{HighScoreApi, HttpScoreClient};

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    let matches = App::new("puzzle-scores")
        .version("0.1")
        .about("Reads and submits puzzle high scores")
        .arg(
            Arg::new("server")
                .short('s')
                .long("server")
                .takes_value(true)
                .help("Server base url [env: SCORES_SERVER, default: http://127.0.0.1:5000]"),
        )
        .subcommand(App::new("get").about("Print every level's best scores"))
        .subcommand(
            App::new("submit")
                .about("Submit the moves needed to finish a puzzle")
                .arg(Arg::new("level").required(true).help("veryEasy, easy, medium or hard"))
                .arg(Arg::new("image").required(true).help("Puzzle image name, e.g. cat.png"))
                .arg(Arg::new("moves").required(true).help("Number of moves")),
        )
        .get_matches();

    let server = matches
        .value_of("server")
        .map(String::from)
        .or_else(|| std::env::var("SCORES_SERVER").ok())
        .unwrap_or_else(|| String::from("http://127.0.0.1:5000"));
    let client = HttpScoreClient::new(&server)?;

    match matches.subcommand() {
        Some(("submit", args)) => {
            let level = args.value_of("level").unwrap_or_default();
            let image = args.value_of("image").unwrap_or_default();
            let moves = args
                .value_of("moves")
                .unwrap_or_default()
                .parse::<u64>()
                .context("moves must be a positive number")?;
            let outcome = client
                .submit_score(level, image, moves)
                .await
                .with_context(|| format!("submitting to {}", client.endpoint()))?;
            println!("{}", outcome.message);
        }
        _ => {
            let table = client
                .high_scores()
                .await
                .with_context(|| format!("fetching from {}", client.endpoint()))?;
            for (level, images) in table.by_difficulty() {
                println!("{}:", level);
                if images.is_empty() {
                    println!("  (no scores yet)");
                }
                for (image, score) in images {
                    println!("  {:<32} {} moves", image, score.moves);
                }
            }
        }
    }
    Ok(())
}
