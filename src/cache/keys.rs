//! Type-safe cache key builders

use std::fmt;

pub const VERSION: &str = "v1";

pub mod sim {
    use super::*;

    pub const NAMESPACE: &str = "sim";

    /// Data/voice/text usage snapshot for one SIM
    #[derive(Debug, Clone)]
    pub struct UsageKey {
        pub iccid: String,
    }

    impl UsageKey {
        pub fn new(iccid: impl Into<String>) -> Self {
            Self {
                iccid: iccid.into(),
            }
        }
    }

    impl fmt::Display for UsageKey {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "{}:{}:usage:{}", VERSION, NAMESPACE, self.iccid)
        }
    }

    /// Topup packages purchasable for one SIM
    #[derive(Debug, Clone)]
    pub struct TopupPackagesKey {
        pub iccid: String,
    }

    impl TopupPackagesKey {
        pub fn new(iccid: impl Into<String>) -> Self {
            Self {
                iccid: iccid.into(),
            }
        }
    }

    impl fmt::Display for TopupPackagesKey {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "{}:{}:topups:{}", VERSION, NAMESPACE, self.iccid)
        }
    }

    /// Install instructions, keyed per language since the provider
    /// localizes the manual steps
    #[derive(Debug, Clone)]
    pub struct InstructionsKey {
        pub iccid: String,
        pub language: String,
    }

    impl InstructionsKey {
        pub fn new(iccid: impl Into<String>, language: impl Into<String>) -> Self {
            Self {
                iccid: iccid.into(),
                language: language.into(),
            }
        }
    }

    impl fmt::Display for InstructionsKey {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(
                f,
                "{}:{}:instructions:{}:{}",
                VERSION, NAMESPACE, self.iccid, self.language
            )
        }
    }
}
