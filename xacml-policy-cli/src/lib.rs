/*
 * Copyright Cedar Contributors
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 * You may obtain a copy of the License at
 *
 *      https://www.apache.org/licenses/LICENSE-2.0
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the License for the specific language governing permissions and
 * limitations under the License.
 */

// This modules makes use of `return` to exit early with a particular exit code.
// For consistency, it also uses `return` in some places where it could be
// omitted.
#![allow(clippy::needless_return)]

mod err;

use clap::{Args, Parser, Subcommand};
use miette::{Report, Result, WrapErr};
use serde::de::DeserializeOwned;
use std::{
    path::Path,
    process::{ExitCode, Termination},
    sync::Arc,
    time::Instant,
};

use err::{IntoDiagnostic, JsonError};
use xacml_policy_core::ast::{Decision, Response};
use xacml_policy_core::est::{self, PolicyDocument};
use xacml_policy_core::policy_source::PolicySnapshot;
use xacml_policy_core::{EngineConfig, Pdp, Registry};

/// Basic XACML CLI for evaluating authorization requests
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)] // Pull from `Cargo.toml`
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Evaluate an authorization request
    Authorize(AuthorizeArgs),
    /// Check that policies successfully parse and convert
    CheckParse(CheckParseArgs),
    /// Print policies in their normalized form
    Format(FormatArgs),
}

#[derive(Args, Debug)]
pub struct CheckParseArgs {
    /// File containing the policy document. If none is provided, read input from stdin.
    #[arg(short, long = "policies", value_name = "FILE")]
    pub policies_file: Option<String>,
    /// File containing the engine configuration
    #[arg(long = "config", value_name = "FILE", env = "XACML_CONFIG")]
    pub config_file: Option<String>,
}

#[derive(Args, Debug)]
pub struct AuthorizeArgs {
    /// File containing the policy document to evaluate against
    #[arg(short, long = "policies", value_name = "FILE")]
    pub policies_file: String,
    /// File containing a JSON request
    #[arg(short, long = "request", value_name = "FILE")]
    pub request_file: String,
    /// File containing the engine configuration
    #[arg(long = "config", value_name = "FILE", env = "XACML_CONFIG")]
    pub config_file: Option<String>,
    /// More verbose output. (For instance, indicate which policies applied to the request, if any.)
    #[arg(short, long)]
    pub verbose: bool,
    /// Time authorization and report timing information
    #[arg(short, long)]
    pub timing: bool,
}

#[derive(Args, Debug)]
pub struct FormatArgs {
    /// File containing the policy document. If none is provided, read input from stdin.
    #[arg(short, long = "policies", value_name = "FILE")]
    pub policies_file: Option<String>,
    /// File containing the engine configuration
    #[arg(long = "config", value_name = "FILE", env = "XACML_CONFIG")]
    pub config_file: Option<String>,
}

#[derive(Eq, PartialEq, Debug)]
pub enum XacmlExitCode {
    // The command completed successfully; for `authorize`, the decision was
    // Permit.
    Success,
    // The command failed to complete successfully.
    Failure,
    // The request was evaluated and the decision was Deny.
    AuthorizeDeny,
    // The request was evaluated but no Permit or Deny was reached.
    AuthorizeUndecided,
}

impl Termination for XacmlExitCode {
    fn report(self) -> ExitCode {
        match self {
            XacmlExitCode::Success => ExitCode::SUCCESS,
            XacmlExitCode::Failure => ExitCode::FAILURE,
            XacmlExitCode::AuthorizeDeny => ExitCode::from(2),
            XacmlExitCode::AuthorizeUndecided => ExitCode::from(3),
        }
    }
}

impl XacmlExitCode {
    /// The exit code for a response. A response with several results is a
    /// Permit only if all of them are, and a Deny only if every result is a
    /// Permit or a Deny.
    pub fn for_response(response: &Response) -> Self {
        let decisions = response.results.iter().map(|r| r.decision);
        if response.results.is_empty() {
            XacmlExitCode::AuthorizeUndecided
        } else if decisions.clone().all(|d| d == Decision::Permit) {
            XacmlExitCode::Success
        } else if decisions.clone().all(|d| matches!(d, Decision::Permit | Decision::Deny)) {
            XacmlExitCode::AuthorizeDeny
        } else {
            XacmlExitCode::AuthorizeUndecided
        }
    }
}

pub fn check_parse(args: &CheckParseArgs) -> XacmlExitCode {
    let loaded = load_engine_config(args.config_file.as_ref()).and_then(|config| {
        read_snapshot(args.policies_file.as_ref(), &Registry::standard(), &config)
    });
    match loaded {
        Ok(_) => XacmlExitCode::Success,
        Err(e) => {
            println!("{:?}", e);
            XacmlExitCode::Failure
        }
    }
}

fn format_policies_inner(args: &FormatArgs) -> Result<()> {
    let config = load_engine_config(args.config_file.as_ref())?;
    let snapshot = read_snapshot(args.policies_file.as_ref(), &Registry::standard(), &config)?;
    let normalized = PolicyDocument::from_snapshot(&snapshot);
    println!(
        "{}",
        serde_json::to_string_pretty(&normalized).into_diagnostic()?
    );
    Ok(())
}

pub fn format_policies(args: &FormatArgs) -> XacmlExitCode {
    if let Err(msg) = format_policies_inner(args) {
        eprintln!("{:?}", msg);
        XacmlExitCode::Failure
    } else {
        XacmlExitCode::Success
    }
}

pub fn authorize(args: &AuthorizeArgs) -> XacmlExitCode {
    let ans = execute_request(args);
    match ans {
        Ok(response) => {
            match serde_json::to_string_pretty(&response) {
                Ok(json) => println!("{json}"),
                Err(e) => {
                    eprintln!("failed to serialize the response: {e}");
                    return XacmlExitCode::Failure;
                }
            }
            if args.verbose {
                for (i, result) in response.results.iter().enumerate() {
                    eprintln!();
                    if result.policy_identifiers.is_empty() {
                        eprintln!("note: no policies applied to result {i}");
                    } else {
                        eprintln!(
                            "note: result {i} ({}) is due to the following policies:",
                            result.decision
                        );
                        for identifier in &result.policy_identifiers {
                            eprintln!("  {} (version {})", identifier.id, identifier.version);
                        }
                    }
                    if let Some(message) = result.status.as_ref().and_then(|s| s.message.as_ref())
                    {
                        eprintln!("note: {message}");
                    }
                }
            }
            XacmlExitCode::for_response(&response)
        }
        Err(err) => {
            eprintln!("{:?}", err);
            XacmlExitCode::Failure
        }
    }
}

fn execute_request(args: &AuthorizeArgs) -> Result<Response> {
    let registry = Registry::standard();
    let config = load_engine_config(args.config_file.as_ref())?;
    let snapshot = read_snapshot(Some(&args.policies_file), &registry, &config)?;
    let request_src = read_from_file_or_stdin(Some(&args.request_file), "request")?;

    let pdp = Pdp::new(registry, config, Arc::new(snapshot));
    let start = Instant::now();
    // A request that does not parse is answered with an Indeterminate
    // syntax-error result rather than a load failure
    let response = match est::Request::from_json_str(&request_src) {
        Ok(request) => pdp.evaluate_est(&est::Request {
            // Lists of policy identifiers are needed for the verbose notes
            return_policy_id_list: request.return_policy_id_list || args.verbose,
            ..request
        }),
        Err(_) => pdp.evaluate_json(&request_src),
    };
    if args.timing {
        eprintln!("Authorization Time (micro seconds) : {}", start.elapsed().as_micros());
    }
    Ok(response)
}

fn load_engine_config(filename: Option<impl AsRef<Path>>) -> Result<EngineConfig> {
    match filename {
        Some(filename) => read_json(filename, "engine configuration"),
        None => Ok(EngineConfig::default()),
    }
}

fn read_snapshot(
    filename: Option<impl AsRef<Path>>,
    registry: &Registry,
    config: &EngineConfig,
) -> Result<PolicySnapshot> {
    let context = "policy document";
    let document: PolicyDocument = match filename.as_ref() {
        Some(path) => read_json(path, context)?,
        None => parse_json(&read_from_file_or_stdin(None::<&str>, context)?, "<stdin>", context)?,
    };
    let snapshot = document
        .to_snapshot(registry, config)
        .map_err(Report::from)
        .wrap_err_with(|| format!("failed to convert {context}"))?;
    tracing::debug!(
        roots = snapshot.roots().len(),
        library = snapshot.library().len(),
        "loaded policy document"
    );
    Ok(snapshot)
}

fn read_json<T: DeserializeOwned>(filename: impl AsRef<Path>, context: &'static str) -> Result<T> {
    let src = read_from_file_or_stdin(Some(filename.as_ref()), context)?;
    parse_json(&src, &filename.as_ref().display().to_string(), context)
}

fn parse_json<T: DeserializeOwned>(src: &str, name: &str, context: &'static str) -> Result<T> {
    serde_json::from_str(src).map_err(|error| {
        Report::from(JsonError {
            context,
            file: name.to_owned(),
            error,
        })
    })
}

// Read from a file (when `filename` is a `Some`) or stdin (when `filename` is `None`)
fn read_from_file_or_stdin(filename: Option<impl AsRef<Path>>, context: &str) -> Result<String> {
    let mut src_str = String::new();
    match filename.as_ref() {
        Some(path) => {
            src_str = std::fs::read_to_string(path)
                .into_diagnostic()
                .wrap_err_with(|| {
                    format!(
                        "failed to open {} file {}",
                        context,
                        path.as_ref().display()
                    )
                })?;
        }
        None => {
            std::io::Read::read_to_string(&mut std::io::stdin(), &mut src_str)
                .into_diagnostic()
                .wrap_err_with(|| format!("failed to read {} from stdin", context))?;
        }
    };
    Ok(src_str)
}

#[cfg(test)]
// PANIC SAFETY: Unit Test Code
#[allow(clippy::indexing_slicing)]
mod test {
    use super::*;
    use xacml_policy_core::ast::{DecisionResult, IndeterminateKind};

    fn response(decisions: &[Decision]) -> Response {
        Response {
            results: decisions.iter().copied().map(DecisionResult::new).collect(),
        }
    }

    #[test]
    fn exit_codes_follow_the_decisions() {
        use Decision::*;
        assert_eq!(
            XacmlExitCode::for_response(&response(&[Permit])),
            XacmlExitCode::Success
        );
        assert_eq!(
            XacmlExitCode::for_response(&response(&[Deny])),
            XacmlExitCode::AuthorizeDeny
        );
        assert_eq!(
            XacmlExitCode::for_response(&response(&[NotApplicable])),
            XacmlExitCode::AuthorizeUndecided
        );
        assert_eq!(
            XacmlExitCode::for_response(&response(&[Indeterminate(IndeterminateKind::Permit)])),
            XacmlExitCode::AuthorizeUndecided
        );
        assert_eq!(
            XacmlExitCode::for_response(&response(&[Permit, Deny])),
            XacmlExitCode::AuthorizeDeny
        );
        assert_eq!(
            XacmlExitCode::for_response(&response(&[Permit, NotApplicable])),
            XacmlExitCode::AuthorizeUndecided
        );
        assert_eq!(
            XacmlExitCode::for_response(&response(&[])),
            XacmlExitCode::AuthorizeUndecided
        );
    }

    #[test]
    fn missing_config_is_the_default() {
        assert_eq!(
            load_engine_config(None::<&str>).unwrap(),
            EngineConfig::default()
        );
    }
}
