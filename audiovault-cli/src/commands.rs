//! Command handlers wiring configuration and the token store to the engine.

use anyhow::{Context, Result, bail};
use audiovault_core::auth::is_loopback_redirect;
use audiovault_core::{
    Artifact, AuthorizationRequest, CallbackOutcome, CredentialManager, LibraryExporter, LogProgress,
    RedirectListener, RemoteClient, RestoreOptions, Restorer, SecretStore, SpotifyLibrary, Vault, create_store,
    export_file_name,
};
use chrono::Utc;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};
use zeroize::Zeroizing;

use crate::config::CliConfig;

type Manager = CredentialManager<Box<dyn SecretStore>>;

/// Engine objects shared by every command.
pub struct Session {
    config: CliConfig,
    manager: Arc<Manager>,
}

impl Session {
    pub fn open(config: CliConfig) -> Self {
        let store = create_store(config.app.token_store, config.credentials_path());
        let manager = Arc::new(CredentialManager::new(store, config.app.clone()));
        Self { config, manager }
    }

    fn library(&self) -> SpotifyLibrary {
        SpotifyLibrary::new(RemoteClient::new(&self.config.app.api_base, self.manager.clone()))
    }

    pub async fn login(&self) -> Result<()> {
        let (request, listener) = self.prepare_login().await?;

        println!("Open this address in a browser to authorize Audio Vault:");
        println!();
        println!("  {}", request.url);
        println!();

        let Some(listener) = listener else {
            println!("Then run `audiovault complete <redirected address>`.");
            return Ok(());
        };

        info!("Waiting for the authorization redirect on {}", listener.local_addr()?);
        let redirect = listener.accept_redirect().await?;
        self.complete(&redirect).await
    }

    /// Bind the loopback redirect target (when there is one) before starting
    /// the login, so the redirect always finds a listener.
    async fn prepare_login(&self) -> Result<(AuthorizationRequest, Option<RedirectListener>)> {
        let redirect_uri = self.config.app.redirect_uri.as_deref().unwrap_or_default();
        let listener = if is_loopback_redirect(redirect_uri) {
            Some(RedirectListener::for_redirect_uri(redirect_uri).await?)
        } else {
            None
        };

        let request = self.manager.begin_login().await?;
        Ok((request, listener))
    }

    pub async fn complete(&self, redirect: &str) -> Result<()> {
        match self.manager.complete_login_from_redirect(redirect).await? {
            CallbackOutcome::NotACallback => {
                bail!("The address carries no authorization code; paste the full redirected address")
            }
            CallbackOutcome::Completed { clean_url } => {
                debug!("Redirect address after cleanup: {}", clean_url);
                println!("Logged in.");
                Ok(())
            }
        }
    }

    pub async fn status(&self) -> Result<()> {
        match self.manager.credential().await? {
            None => println!("Not logged in."),
            Some(record) if record.is_live() => {
                println!("Logged in.");
                println!("  Token expires: {}", record.expires_at.to_rfc3339());
                println!("  Refreshable:   {}", record.refresh_token.is_some());
                println!("  Scopes:        {}", record.scopes().join(" "));
            }
            Some(record) => {
                println!("Session expired at {}.", record.expires_at.to_rfc3339());
                if record.refresh_token.is_some() {
                    println!("It will be refreshed on the next export or restore.");
                }
            }
        }
        Ok(())
    }

    pub async fn logout(&self) -> Result<()> {
        self.manager.logout().await?;
        println!("Logged out.");
        Ok(())
    }

    pub async fn export(&self, out: Option<PathBuf>, plain: bool, passphrase_env: Option<&str>) -> Result<()> {
        // Ask before reading the library so a typo doesn't waste a long run.
        let passphrase = if plain {
            None
        } else {
            Some(read_passphrase(passphrase_env, true)?)
        };

        let library = self.library();
        let payload = LibraryExporter::new(&library).snapshot(&LogProgress).await?;

        let contents = match passphrase {
            Some(passphrase) => Vault::new().encrypt(&payload, &passphrase)?.to_json_pretty()?,
            None => payload.to_json_pretty()?,
        };

        let path = out.unwrap_or_else(|| {
            let user_id = payload.account.as_ref().map(|a| a.id.as_str()).unwrap_or_default();
            PathBuf::from(export_file_name(user_id, Utc::now()))
        });
        std::fs::write(&path, contents).with_context(|| format!("Failed to write export to {:?}", path))?;

        let summary = payload.summarize();
        println!(
            "Exported {} liked tracks, {} playlists ({} tracks), {} artists and {} albums to {}",
            summary.liked_tracks,
            summary.playlists,
            summary.playlist_tracks,
            summary.followed_artists,
            summary.saved_albums,
            path.display()
        );
        if !plain {
            println!("Keep the passphrase safe; the file cannot be opened without it.");
        }
        Ok(())
    }

    pub async fn restore(&self, file: &Path, reuse_existing: bool, passphrase_env: Option<&str>) -> Result<()> {
        let payload = load_artifact(file, passphrase_env)?;

        let library = self.library();
        let options = RestoreOptions::default()
            .with_reuse_existing(reuse_existing)
            .with_observer(&LogProgress);
        let summary = Restorer::new(&library).restore(&payload, options).await?;

        println!("Restore complete.");
        println!("  Liked tracks saved:  {}", summary.liked_restored);
        println!("  Playlists created:   {}", summary.created_playlists);
        println!("  Playlists reused:    {}", summary.reused_playlists);
        println!("  Playlist tracks:     {}", summary.tracks_added);
        println!("  Artists followed:    {}", summary.followed_artists_restored);
        println!("  Albums saved:        {}", summary.saved_albums_restored);
        Ok(())
    }
}

/// Read an export file, decrypting it when it is an encrypted bundle.
///
/// The passphrase is only asked for when the file needs one.
pub fn load_artifact(file: &Path, passphrase_env: Option<&str>) -> Result<audiovault_core::BackupPayload> {
    let text = std::fs::read_to_string(file).with_context(|| format!("Failed to read {:?}", file))?;
    let artifact = Artifact::parse(&text).with_context(|| format!("Failed to load {:?}", file))?;

    let passphrase = if artifact.is_encrypted() {
        Some(read_passphrase(passphrase_env, false)?)
    } else {
        None
    };

    let payload = artifact
        .into_payload(&Vault::new(), passphrase.as_deref().map(String::as_str))
        .with_context(|| format!("Failed to open {:?}", file))?;
    Ok(payload)
}

/// Passphrase from the named environment variable, or prompted without echo.
fn read_passphrase(env_var: Option<&str>, confirm: bool) -> Result<Zeroizing<String>> {
    if let Some(name) = env_var {
        let value = std::env::var(name).with_context(|| format!("Environment variable {} is not set", name))?;
        return Ok(Zeroizing::new(value));
    }

    let passphrase = Zeroizing::new(rpassword::prompt_password("Passphrase: ").context("Failed to read passphrase")?);
    if confirm {
        let again =
            Zeroizing::new(rpassword::prompt_password("Repeat passphrase: ").context("Failed to read passphrase")?);
        if *again != *passphrase {
            bail!("Passphrases do not match");
        }
    }
    Ok(passphrase)
}
