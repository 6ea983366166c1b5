use imgproc_client::CommandClient;

use crate::cmd::ClientArgs;
use crate::exit::{client_error, CliResult, SUCCESS};
use crate::output::{print_status, OutputFormat};

pub fn run(client: &ClientArgs, format: OutputFormat) -> CliResult<i32> {
    let commands = CommandClient::connect(client.config()?)
        .map_err(|err| client_error("connect failed", err))?;
    commands
        .clear_cache()
        .map_err(|err| client_error("clear_cache failed", err))?;

    print_status("ok", "server cache cleared", format);
    Ok(SUCCESS)
}
