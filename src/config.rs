//! Build-time constants and read-only simulator knobs (spec.md §6).

/// Construction-time misconfiguration. Every other prefetcher entry
/// point is infallible — see DESIGN.md / SPEC_FULL.md §1.2.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("l2_sets must be non-zero")]
    ZeroSets,
    #[error("l2_associativity must be non-zero")]
    ZeroAssociativity,
    #[error("num_cpus must be non-zero")]
    ZeroCpus,
}

/// Shared, read-mostly configuration for one or more [`crate::Prefetcher`]
/// instances. Construct via [`Builder`].
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub l2_sets: usize,
    pub l2_associativity: usize,
    pub num_cpus: usize,

    pub t_interval: u32,
    pub mshr_mirror_size: usize,
    pub page_table_size: usize,
    pub pollution_bits: usize,

    pub a_low: f64,
    pub a_high: f64,
    pub t_lat: f64,
    pub t_pol: f64,
    pub ewma_alpha: f64,
    pub ewma_epsilon: f64,

    /// Shared MSHR-occupancy threshold used by the stream detector and
    /// by AMPM's positive scan (spec.md §4.F, §4.G).
    pub l2_mshr_occupancy_threshold: u32,
    /// AMPM's negative scan uses a distinct threshold in the reference
    /// source (`ampm.c`); see SPEC_FULL.md §2.3 / §4.
    pub ampm_negative_mshr_threshold: u32,

    /// Read-only knobs observable by the prefetcher (spec.md §6). This
    /// specification conditions no behavior on them (SPEC_FULL.md §1.3).
    pub scramble_loads: bool,
    pub small_llc: bool,
    pub low_bandwidth: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            l2_sets: 2048,
            l2_associativity: 16,
            num_cpus: 1,

            t_interval: 512,
            mshr_mirror_size: 2048,
            page_table_size: 64,
            pollution_bits: 4096,

            a_low: 0.40,
            a_high: 0.75,
            t_lat: 0.01,
            t_pol: 0.005,
            ewma_alpha: 0.5,
            ewma_epsilon: 1e-3,

            l2_mshr_occupancy_threshold: 8,
            ampm_negative_mshr_threshold: 12,

            scramble_loads: false,
            small_llc: false,
            low_bandwidth: false,
        }
    }
}

impl Config {
    #[must_use]
    pub fn builder() -> Builder {
        Builder::default()
    }

    /// Name of the compiled-in detector variant (SPEC_FULL.md §2.2).
    #[must_use]
    pub const fn variant_name() -> &'static str {
        #[cfg(all(feature = "stream", feature = "ampm"))]
        compile_error!("exactly one of the `stream`/`ampm` features must be enabled");
        #[cfg(all(not(feature = "stream"), not(feature = "ampm")))]
        compile_error!("exactly one of the `stream`/`ampm` features must be enabled");

        #[cfg(feature = "stream")]
        {
            "Streaming Prefetcher"
        }
        #[cfg(feature = "ampm")]
        {
            "AMPM Lite Prefetcher"
        }
    }
}

/// Builder for [`Config`], mirroring `cache::data::Builder` in the
/// teacher codebase: plain fields with `Default`, validated on `build()`.
#[derive(Debug, Clone)]
pub struct Builder {
    inner: Config,
}

impl Default for Builder {
    fn default() -> Self {
        Self {
            inner: Config::default(),
        }
    }
}

macro_rules! setter {
    ($name:ident: $ty:ty) => {
        #[must_use]
        pub fn $name(mut self, value: $ty) -> Self {
            self.inner.$name = value;
            self
        }
    };
}

impl Builder {
    setter!(l2_sets: usize);
    setter!(l2_associativity: usize);
    setter!(num_cpus: usize);
    setter!(t_interval: u32);
    setter!(mshr_mirror_size: usize);
    setter!(page_table_size: usize);
    setter!(pollution_bits: usize);
    setter!(l2_mshr_occupancy_threshold: u32);
    setter!(ampm_negative_mshr_threshold: u32);
    setter!(scramble_loads: bool);
    setter!(small_llc: bool);
    setter!(low_bandwidth: bool);

    pub fn build(self) -> Result<Config, ConfigError> {
        if self.inner.l2_sets == 0 {
            return Err(ConfigError::ZeroSets);
        }
        if self.inner.l2_associativity == 0 {
            return Err(ConfigError::ZeroAssociativity);
        }
        if self.inner.num_cpus == 0 {
            return Err(ConfigError::ZeroCpus);
        }
        Ok(self.inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_builds() {
        let cfg = Config::builder().build().unwrap();
        assert_eq!(cfg.t_interval, 512);
        assert_eq!(cfg.mshr_mirror_size, 2048);
    }

    #[test]
    fn zero_sets_rejected() {
        let err = Config::builder().l2_sets(0).build().unwrap_err();
        assert_eq!(err, ConfigError::ZeroSets);
    }

    #[test]
    fn zero_associativity_rejected() {
        let err = Config::builder().l2_associativity(0).build().unwrap_err();
        assert_eq!(err, ConfigError::ZeroAssociativity);
    }
}
