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

#![forbid(unsafe_code)]

use xacml_policy_cli::{authorize, check_parse, format_policies, Cli, Commands, XacmlExitCode};

use clap::Parser;
use tracing_subscriber::EnvFilter;

fn main() -> XacmlExitCode {
    let cli = Cli::parse();
    let default_level = match &cli.command {
        Commands::Authorize(args) if args.verbose => "debug",
        _ => "warn",
    };
    // Logs go to stderr so stdout stays machine-readable
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Authorize(args) => authorize(&args),
        Commands::CheckParse(args) => check_parse(&args),
        Commands::Format(args) => format_policies(&args),
    }
}
