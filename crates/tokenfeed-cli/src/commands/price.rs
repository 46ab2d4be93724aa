use serde_json::Value;
use tokenfeed_core::AggregatorService;

use crate::cli::{CoinArgs, HistoryArgs, QuoteArgs, QuotesArgs, SearchArgs, TrendingArgs};
use crate::error::CliError;

pub async fn quote(args: &QuoteArgs, service: &AggregatorService) -> Result<Value, CliError> {
    let quote = match args.vs_currency.as_deref() {
        Some(vs) if !vs.trim().eq_ignore_ascii_case("usd") => service.quote(&args.id, vs).await?,
        _ => service.best_quote(&args.id).await?,
    };
    Ok(serde_json::to_value(quote)?)
}

pub async fn quotes(args: &QuotesArgs, service: &AggregatorService) -> Result<Value, CliError> {
    let quotes = service.quotes(args.ids.as_slice(), &args.vs_currency).await?;
    Ok(serde_json::to_value(quotes)?)
}

pub async fn detail(args: &CoinArgs, service: &AggregatorService) -> Result<Value, CliError> {
    Ok(serde_json::to_value(service.detail(&args.id).await?)?)
}

pub async fn history(args: &HistoryArgs, service: &AggregatorService) -> Result<Value, CliError> {
    Ok(serde_json::to_value(service.history(&args.id, args.days).await?)?)
}

pub async fn search(args: &SearchArgs, service: &AggregatorService) -> Result<Value, CliError> {
    Ok(serde_json::to_value(service.search(&args.query).await?)?)
}

pub async fn trending(args: &TrendingArgs, service: &AggregatorService) -> Result<Value, CliError> {
    Ok(serde_json::to_value(service.trending(args.limit).await?)?)
}

pub async fn market(service: &AggregatorService) -> Result<Value, CliError> {
    Ok(serde_json::to_value(service.market_snapshot().await?)?)
}

/// Partial results still succeed; the missing pieces are listed under `failures`.
pub async fn report(args: &CoinArgs, service: &AggregatorService) -> Result<Value, CliError> {
    Ok(serde_json::to_value(service.comprehensive_detail(&args.id).await?)?)
}
