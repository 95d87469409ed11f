//! Trust configuration: which proxy header is believed, and for which peers.
//!
//! Directives are applied once at startup. `apply` freezes the result into an
//! [`IpExtractor`] that request handling only ever reads.

use thiserror::Error;

use crate::config::TrustSettings;
use crate::trust::cidr::{Cidr, CidrError};
use crate::trust::extractor::{IpChecker, IpExtractor};

/// Startup faults raised while building a [`TrustConfig`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TrustError {
    #[error(transparent)]
    Cidr(#[from] CidrError),

    #[error("cannot trust both X-Forwarded-For and X-Real-IP")]
    ConflictingModes,
}

/// Which proxy header is used to derive the client address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TrustMode {
    /// Use the socket peer address.
    #[default]
    None,
    /// Walk the `X-Forwarded-For` chain.
    XForwardedFor,
    /// Use `X-Real-IP` when the peer is trusted.
    RealIp,
}

/// A single configuration directive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrustDirective {
    /// Trust `X-Forwarded-For` hops inside this CIDR.
    Xff(String),
    /// Trust `X-Real-IP` from peers inside this CIDR.
    RealIp(String),
}

/// Trust policy under construction.
#[derive(Debug, Clone)]
pub struct TrustConfig {
    mode: TrustMode,
    ranges: Vec<Cidr>,
    trust_loopback: bool,
    trust_link_local: bool,
    trust_private_net: bool,
}

impl Default for TrustConfig {
    fn default() -> Self {
        Self {
            mode: TrustMode::None,
            ranges: Vec::new(),
            trust_loopback: true,
            trust_link_local: true,
            trust_private_net: true,
        }
    }
}

impl TrustConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Trust `X-Forwarded-For` for the given CIDR.
    pub fn trust_xff(self, cidr: &str) -> Result<Self, TrustError> {
        self.select(TrustMode::XForwardedFor, cidr)
    }

    /// Trust `X-Real-IP` for the given CIDR.
    pub fn trust_real_ip(self, cidr: &str) -> Result<Self, TrustError> {
        self.select(TrustMode::RealIp, cidr)
    }

    /// Apply one directive.
    pub fn directive(self, directive: &TrustDirective) -> Result<Self, TrustError> {
        match directive {
            TrustDirective::Xff(cidr) => self.trust_xff(cidr),
            TrustDirective::RealIp(cidr) => self.trust_real_ip(cidr),
        }
    }

    /// Apply a sequence of directives in order.
    pub fn from_directives<'a, I>(directives: I) -> Result<Self, TrustError>
    where
        I: IntoIterator<Item = &'a TrustDirective>,
    {
        directives
            .into_iter()
            .try_fold(Self::new(), |config, d| config.directive(d))
    }

    /// Build from the `[trust]` section of the configuration file.
    pub fn from_settings(settings: &TrustSettings) -> Result<Self, TrustError> {
        let directives: Vec<TrustDirective> = settings
            .xff_cidrs
            .iter()
            .cloned()
            .map(TrustDirective::Xff)
            .chain(settings.real_ip_cidrs.iter().cloned().map(TrustDirective::RealIp))
            .collect();

        Ok(Self::from_directives(&directives)?
            .trust_loopback(settings.trust_loopback)
            .trust_link_local(settings.trust_link_local)
            .trust_private_net(settings.trust_private_net))
    }

    /// Whether loopback peers are implicitly trusted (default: true).
    pub fn trust_loopback(mut self, trust: bool) -> Self {
        self.trust_loopback = trust;
        self
    }

    /// Whether link-local peers are implicitly trusted (default: true).
    pub fn trust_link_local(mut self, trust: bool) -> Self {
        self.trust_link_local = trust;
        self
    }

    /// Whether private-network peers are implicitly trusted (default: true).
    pub fn trust_private_net(mut self, trust: bool) -> Self {
        self.trust_private_net = trust;
        self
    }

    pub fn mode(&self) -> TrustMode {
        self.mode
    }

    pub fn ranges(&self) -> &[Cidr] {
        &self.ranges
    }

    /// Freeze the configuration into an extractor.
    pub fn apply(self) -> IpExtractor {
        tracing::info!(
            mode = ?self.mode,
            ranges = ?self.ranges.iter().map(ToString::to_string).collect::<Vec<_>>(),
            "Client IP trust configured"
        );

        let checker = IpChecker {
            ranges: self.ranges,
            trust_loopback: self.trust_loopback,
            trust_link_local: self.trust_link_local,
            trust_private_net: self.trust_private_net,
        };
        IpExtractor::new(self.mode, checker)
    }

    fn select(mut self, mode: TrustMode, cidr: &str) -> Result<Self, TrustError> {
        let range: Cidr = cidr.parse()?;

        if self.mode != TrustMode::None && self.mode != mode {
            return Err(TrustError::ConflictingModes);
        }
        self.mode = mode;
        self.ranges.push(range);
        Ok(self)
    }
}
