//! [`ClaimStore`] — reads and writes installation records through any
//! [`BackingStore`].
//!
//! The repository neither knows nor cares whether the store beneath it is a
//! raw backend or a storage manager decorating one.

use crate::{
  BackingStore, Error, Result,
  claim::Claim,
  installation::{INSTALLATIONS_GROUP, Installation},
};

pub struct ClaimStore<S> {
  store: S,
}

impl<S: BackingStore> ClaimStore<S> {
  pub fn new(store: S) -> Self { Self { store } }

  pub fn store(&self) -> &S { &self.store }

  /// Names of every stored installation, sorted.
  pub fn list_installations(&self) -> Result<Vec<String>> {
    self.store.list(INSTALLATIONS_GROUP, "")
  }

  pub fn read_installation(&self, name: &str) -> Result<Installation> {
    let data = self
      .store
      .read_optional(INSTALLATIONS_GROUP, "", name)?
      .ok_or_else(|| Error::InstallationNotFound(name.to_owned()))?;
    Ok(serde_json::from_slice(&data)?)
  }

  /// Create or replace the record for `installation.name`.
  pub fn save_installation(&self, installation: &Installation) -> Result<()> {
    let data = serde_json::to_vec_pretty(installation)?;
    self
      .store
      .save(INSTALLATIONS_GROUP, "", &installation.name, &data)
  }

  pub fn delete_installation(&self, name: &str) -> Result<()> {
    match self.store.delete(INSTALLATIONS_GROUP, "", name) {
      Err(e) if e.is_not_found() => {
        Err(Error::InstallationNotFound(name.to_owned()))
      }
      other => other,
    }
  }

  /// The most recent claim recorded for the installation.
  pub fn read_last_claim(&self, name: &str) -> Result<Claim> {
    let installation = self.read_installation(name)?;
    installation
      .last_claim()
      .cloned()
      .ok_or_else(|| Error::NoClaims(name.to_owned()))
  }

  /// Append `claim` to its installation, creating the installation first if
  /// it does not exist yet.
  pub fn append_claim(&self, claim: Claim) -> Result<Installation> {
    let mut installation = match self.read_installation(&claim.installation) {
      Ok(i) => i,
      Err(Error::InstallationNotFound(_)) => {
        Installation::new(claim.installation.clone())
      }
      Err(e) => return Err(e),
    };
    installation.claims.push(claim);
    self.save_installation(&installation)?;
    Ok(installation)
  }
}
