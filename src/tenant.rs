//! Tenant identity derivation.
//!
//! # Responsibilities
//! - Parse `{ref, site, org}` from a host's leftmost label (`ref--site--org`)
//! - Produce the canonical site key used everywhere downstream
//!
//! # Design Decisions
//! - `site` is checked before `org`, so a two-segment label reports the
//!   missing org and a one-segment label reports the missing site
//! - Segments past the third are ignored

use crate::error::{MixerError, MixerResult};

/// One routable site/environment: `{ref, site, org}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tenant {
    pub ref_name: String,
    pub site: String,
    pub org: String,
}

impl Tenant {
    pub fn new(
        ref_name: impl Into<String>,
        site: impl Into<String>,
        org: impl Into<String>,
    ) -> Self {
        Self {
            ref_name: ref_name.into(),
            site: site.into(),
            org: org.into(),
        }
    }

    /// Derive identity from a host's leftmost label, split on `--`.
    pub fn from_host_label(label: &str) -> MixerResult<Self> {
        let mut segments = label.split("--");
        let ref_name = segments.next().unwrap_or_default();
        let site = segments.next().unwrap_or_default();
        let org = segments.next().unwrap_or_default();
        if site.is_empty() {
            return Err(MixerError::missing_identity("site"));
        }
        if org.is_empty() {
            return Err(MixerError::missing_identity("org"));
        }
        Ok(Self::new(ref_name, site, org))
    }

    /// Canonical `ref--site--org` key for config lookup and credentials.
    pub fn site_key(&self) -> String {
        format!("{}--{}--{}", self.ref_name, self.site, self.org)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_three_segments() {
        let tenant = Tenant::from_host_label("main--shop--acme").unwrap();
        assert_eq!(tenant.ref_name, "main");
        assert_eq!(tenant.site, "shop");
        assert_eq!(tenant.org, "acme");
        assert_eq!(tenant.site_key(), "main--shop--acme");
    }

    #[test]
    fn segments_may_contain_single_hyphens() {
        let tenant = Tenant::from_host_label("dev-pdp--edge-stage--retailer").unwrap();
        assert_eq!(tenant.ref_name, "dev-pdp");
        assert_eq!(tenant.site, "edge-stage");
        assert_eq!(tenant.org, "retailer");
    }

    #[test]
    fn missing_site_reported_before_org() {
        let err = Tenant::from_host_label("main").unwrap_err();
        assert_eq!(err.x_error(), "missing site");

        let err = Tenant::from_host_label("main--shop").unwrap_err();
        assert_eq!(err.x_error(), "missing org");
    }

    #[test]
    fn empty_segment_is_missing() {
        let err = Tenant::from_host_label("main----acme").unwrap_err();
        assert_eq!(err.x_error(), "missing site");
    }

    #[test]
    fn extra_segments_ignored() {
        let tenant = Tenant::from_host_label("a--b--c--d").unwrap();
        assert_eq!(tenant.org, "c");
    }
}
