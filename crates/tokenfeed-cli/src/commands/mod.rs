mod catalog;
mod chain;
mod price;

use serde_json::Value;
use tokenfeed_core::AggregatorService;

use crate::cli::Command;
use crate::error::CliError;

/// Run one command and return its JSON document.
pub async fn run(command: &Command, service: &AggregatorService) -> Result<Value, CliError> {
    match command {
        Command::Quote(args) => price::quote(args, service).await,
        Command::Quotes(args) => price::quotes(args, service).await,
        Command::Detail(args) => price::detail(args, service).await,
        Command::History(args) => price::history(args, service).await,
        Command::Search(args) => price::search(args, service).await,
        Command::Trending(args) => price::trending(args, service).await,
        Command::Market => price::market(service).await,
        Command::Report(args) => price::report(args, service).await,
        Command::Feed(args) => chain::feed(args, service).await,
        Command::Supply(args) => chain::supply(args, service).await,
        Command::Chains => catalog::chains(service),
        Command::Dexes => catalog::dexes(service),
        Command::Health => catalog::health(service),
    }
}
