//! Run the code validator over a local source file.

use std::path::Path;

use tracing::{error, info, warn};

/// Validate a source file and report findings.
///
/// Exits non-zero (via the returned error) when validation fails, so the
/// command is usable in CI for block authors.
///
/// # Errors
///
/// Returns an error if the file cannot be read or validation fails.
#[allow(clippy::print_stdout)] // JSON report goes to stdout for piping
pub async fn run(file: &Path, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let source = tokio::fs::read_to_string(file).await?;
    let result = vibefront_engine::validate(&source);

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        for issue in &result.security_issues {
            error!("security: {issue}");
        }
        for issue in &result.errors {
            error!("error: {issue}");
        }
        for issue in &result.warnings {
            warn!("warning: {issue}");
        }
        if result.is_valid {
            info!(
                warnings = result.warnings.len(),
                "validation passed"
            );
        }
    }

    if result.is_valid {
        Ok(())
    } else {
        Err(format!(
            "validation failed: {} fatal finding(s)",
            result.fatal_issues().count()
        )
        .into())
    }
}
