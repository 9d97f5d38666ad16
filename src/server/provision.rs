use crate::error::{Error, Result};
use crate::server::{ServerEntity, ServerId};
use std::path::{Path, PathBuf};

/// Prepares the on-disk data directory of a server
#[derive(Debug, Clone)]
pub struct Provisioner {
    data_dir: PathBuf,
    game_port: u16,
}

impl Provisioner {
    /// `game_port` is the port the game binds inside its container
    pub fn new(data_dir: impl Into<PathBuf>, game_port: u16) -> Self {
        Self {
            data_dir: data_dir.into(),
            game_port,
        }
    }

    /// Root directory holding every server's data
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Data directory of one server, mounted at `/data` in its container
    pub fn server_dir(&self, id: ServerId) -> PathBuf {
        self.data_dir.join(id.to_string())
    }

    /// Create the server directory and write its `server.properties`.
    ///
    /// Returns the server directory.
    #[tracing::instrument(skip(self, entity), fields(server_id = %entity.id))]
    pub async fn provision(&self, entity: &ServerEntity) -> Result<PathBuf> {
        let dir = self.server_dir(entity.id);

        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| Error::Provision(format!("Failed to create {}: {}", dir.display(), e)))?;

        let properties = dir.join("server.properties");
        tokio::fs::write(&properties, render_properties(entity, self.game_port))
            .await
            .map_err(|e| {
                Error::Provision(format!("Failed to write {}: {}", properties.display(), e))
            })?;

        tracing::debug!(dir = %dir.display(), "Provisioned server directory");
        Ok(dir)
    }

    /// Remove a server directory created by [`provision`](Self::provision).
    /// A missing directory is not an error.
    #[tracing::instrument(skip(self), fields(server_id = %id))]
    pub async fn remove(&self, id: ServerId) -> Result<()> {
        let dir = self.server_dir(id);
        match tokio::fs::remove_dir_all(&dir).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::Provision(format!(
                "Failed to remove {}: {}",
                dir.display(),
                e
            ))),
        }
    }
}

fn render_properties(entity: &ServerEntity, game_port: u16) -> String {
    // one property per line
    let motd: String = entity
        .name
        .chars()
        .map(|c| if c.is_control() { ' ' } else { c })
        .collect();

    format!(
        "server-port={}\n\
         max-players={}\n\
         gamemode={}\n\
         difficulty={}\n\
         enable-command-block={}\n\
         motd={}\n",
        game_port,
        entity.max_players,
        entity.gamemode.as_str(),
        entity.difficulty.as_str(),
        entity.command_blocks_enabled,
        motd,
    )
}
