//! Classify command implementation.

use serde::Serialize;
use std::time::Duration;
use zonesync_engine::{ClassifierPolicy, ErrorClassifier};
use zonesync_protocol::{RemoteError, RemoteErrorCode};

/// Classification of one error code.
#[derive(Debug, Serialize)]
pub struct ClassifyResult {
    /// Numeric code.
    pub code: u16,
    /// Code name.
    pub name: &'static str,
    /// Strategy the engine reports.
    pub strategy: String,
    /// Whether a sync may be retried without the user.
    pub automatic: bool,
    /// Whether the user has to be involved.
    pub needs_user: bool,
    /// Delay before retrying, in seconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after_secs: Option<f64>,
}

/// Runs the classify command.
pub fn run(
    code: &str,
    strict: bool,
    retry_after: Option<u64>,
    format: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let code = parse_code(code).ok_or_else(|| format!("Unknown error code: {code}"))?;
    let result = classify(code, policy(strict), retry_after.map(Duration::from_secs));

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        _ => {
            println!("{} ({})", result.name, result.code);
            println!("  strategy:   {}", result.strategy);
            println!("  automatic:  {}", result.automatic);
            println!("  needs user: {}", result.needs_user);
        }
    }

    Ok(())
}

/// Lists every code with its strategy under the default policy.
pub fn list(format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let results: Vec<ClassifyResult> = RemoteErrorCode::ALL
        .iter()
        .map(|code| classify(*code, ClassifierPolicy::default(), None))
        .collect();

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&results)?);
        }
        _ => {
            println!("{:>4}  {:<36} STRATEGY", "CODE", "NAME");
            for result in &results {
                println!("{:>4}  {:<36} {}", result.code, result.name, result.strategy);
            }
        }
    }

    Ok(())
}

fn policy(strict: bool) -> ClassifierPolicy {
    if strict {
        ClassifierPolicy::strict()
    } else {
        ClassifierPolicy::default()
    }
}

fn parse_code(input: &str) -> Option<RemoteErrorCode> {
    match input.parse::<u16>() {
        Ok(number) => RemoteErrorCode::from_code(number),
        Err(_) => RemoteErrorCode::from_name(&input.to_ascii_lowercase().replace('-', "_")),
    }
}

fn classify(
    code: RemoteErrorCode,
    policy: ClassifierPolicy,
    retry_after: Option<Duration>,
) -> ClassifyResult {
    let mut error = RemoteError::new(code, "classified from the command line");
    if let Some(delay) = retry_after {
        error = error.with_retry_after(delay);
    }
    let strategy = ErrorClassifier::new(policy).classify(&error);

    ClassifyResult {
        code: code.to_code(),
        name: code.name(),
        strategy: strategy.to_string(),
        automatic: strategy.is_automatic(),
        needs_user: strategy.needs_user(),
        retry_after_secs: strategy.retry_delay().map(|d| d.as_secs_f64()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_names_and_numbers() {
        assert_eq!(parse_code("zone_busy"), Some(RemoteErrorCode::ZoneBusy));
        assert_eq!(parse_code("Zone-Busy"), Some(RemoteErrorCode::ZoneBusy));
        assert_eq!(parse_code("23"), Some(RemoteErrorCode::ZoneBusy));
        assert_eq!(parse_code("9999"), None);
        assert_eq!(parse_code("nope"), None);
    }

    #[test]
    fn strict_policy_is_fatal() {
        let lenient = classify(RemoteErrorCode::InvalidArguments, policy(false), None);
        let strict = classify(RemoteErrorCode::InvalidArguments, policy(true), None);
        assert_eq!(lenient.strategy, "prompt user");
        assert_eq!(strict.strategy, "fatal stop");
    }

    #[test]
    fn retry_after_is_reported() {
        let result = classify(
            RemoteErrorCode::RequestRateLimited,
            policy(false),
            Some(Duration::from_secs(5)),
        );
        assert!(result.automatic);
        assert_eq!(result.retry_after_secs, Some(5.0));
    }
}
