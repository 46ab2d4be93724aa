use serde_json::Value;
use tokenfeed_core::AggregatorService;

use crate::cli::{FeedArgs, SupplyArgs};
use crate::error::CliError;

pub async fn feed(args: &FeedArgs, service: &AggregatorService) -> Result<Value, CliError> {
    let reading = service.feed_reading(&args.pair, &args.chain).await?;
    Ok(serde_json::to_value(reading)?)
}

pub async fn supply(args: &SupplyArgs, service: &AggregatorService) -> Result<Value, CliError> {
    let reading = service.supply(&args.address, &args.chain).await?;
    Ok(serde_json::to_value(reading)?)
}
