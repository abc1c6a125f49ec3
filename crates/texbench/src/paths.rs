use std::path::PathBuf;

use directories_next::ProjectDirs;

const QUALIFIER: &str = "org";
const ORGANISATION: &str = "texbench";
const APPLICATION: &str = "texbench";

pub const CONFIG_FILE: &str = "config.toml";

/// `<config dir>/texbench/config.toml`, or `None` when the platform has no
/// home directory to anchor it.
pub fn default_config_file() -> Option<PathBuf> {
    ProjectDirs::from(QUALIFIER, ORGANISATION, APPLICATION)
        .map(|dirs| dirs.config_dir().join(CONFIG_FILE))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_file_is_named_config_toml() {
        if let Some(path) = default_config_file() {
            assert_eq!(path.file_name().and_then(|n| n.to_str()), Some(CONFIG_FILE));
        }
    }
}
