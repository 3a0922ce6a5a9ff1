use agora_config::ForumConfig;

use crate::error::CliResult;
use crate::output::render_json;

/// Print the resolved configuration. The database URL is redacted by the
/// config model's serializer.
pub(crate) fn handle_config_show(config: &ForumConfig) -> CliResult<()> {
    println!("{}", render_json(config)?);
    Ok(())
}
