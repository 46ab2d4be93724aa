use serde_json::Value;
use tokenfeed_core::AggregatorService;

use crate::error::CliError;

pub fn chains(service: &AggregatorService) -> Result<Value, CliError> {
    Ok(serde_json::to_value(service.list_supported_chains())?)
}

pub fn dexes(service: &AggregatorService) -> Result<Value, CliError> {
    Ok(serde_json::to_value(service.list_supported_dexes())?)
}

pub fn health(service: &AggregatorService) -> Result<Value, CliError> {
    Ok(serde_json::to_value(service.health_report())?)
}
