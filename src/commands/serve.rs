use crate::commands::Out;
use crate::error::{ErrorType, IntoResult};
use crate::{server, Config, Result};

/// Runs the HTTP API until the process receives Ctrl-C.
///
/// # Arguments
/// - `config` - The loaded configuration. Uploads are imported into its database.
/// - `listen` - Overrides the `listen` address from `config.json` when given.
pub async fn serve(config: Config, listen: Option<&str>) -> Result<Out<()>> {
    let listen = listen.unwrap_or(config.listen()).to_string();
    server::run(config, &listen)
        .await
        .pub_result(ErrorType::Internal)?;
    Ok("Server stopped".into())
}
