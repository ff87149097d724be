use serde_json::Value;

use crate::commands::success_message;
use crate::document::{self, DocumentSource};
use crate::error::Failure;
use crate::output::Output;
use crate::spec_validator::SpecValidator;

pub fn run(source: &DocumentSource, output: &Output) -> Result<(), Failure> {
    let validator = SpecValidator::bundled()?;
    output.debug(&format!("loading {source}"));
    let document = document::load(source).map_err(Failure::Load)?;
    let version = check(&validator, &document)?;
    output.println_always(&success_message(&version));
    Ok(())
}

/// Version gate followed by full schema validation. Returns the version.
pub(crate) fn check(validator: &SpecValidator, document: &Value) -> Result<String, Failure> {
    let version = document::check_version(document)?;
    validator.validate(document)?;
    Ok(version)
}
