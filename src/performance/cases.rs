use std::fmt;
use std::str::FromStr;

use crate::error::Error;
use crate::performance::{BenchmarkHarness, PerformanceTest};


const COMMON_TAGS: &[&str] = &[
    "all",
    "full_regression",
    "single_node",
    "per_rack",
    "dragon_fly",
    "full_system",
    "performance",
];


#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PerformanceCase {
    IorEasy,
    IorHard,
    MdtestEasy,
    MdtestHard,
}

impl PerformanceCase {
    pub const ALL: [PerformanceCase; 4] = [
        Self::IorEasy,
        Self::IorHard,
        Self::MdtestEasy,
        Self::MdtestHard,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::IorEasy => "performance_ior_easy",
            Self::IorHard => "performance_ior_hard",
            Self::MdtestEasy => "performance_mdtest_easy",
            Self::MdtestHard => "performance_mdtest_hard",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::IorEasy => "Create a pool, container, and run IOR Easy",
            Self::IorHard => "Create a pool, container, and run IOR Hard",
            Self::MdtestEasy => "Create a pool, container, and run MdTest Easy",
            Self::MdtestHard => "Create a pool, container, and run MdTest Hard",
        }
    }

    pub fn tags(&self) -> Vec<&'static str> {
        let mut tags = COMMON_TAGS.to_vec();
        tags.push(self.name());
        tags
    }

    pub fn run<H: BenchmarkHarness>(&self, test: &mut PerformanceTest<H>) -> Result<(), Error> {
        tracing::info!("{}: {}", self.name(), self.description());
        match self {
            Self::IorEasy | Self::IorHard => test.run_performance_ior(None, None),
            Self::MdtestEasy | Self::MdtestHard => test.run_performance_mdtest(None),
        }
    }
}

impl FromStr for PerformanceCase {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.strip_prefix("test_").unwrap_or(s);
        Self::ALL
            .into_iter()
            .find(|case| case.name() == name)
            .ok_or_else(|| Error::TestFailed(format!("Unknown performance case: {}", s)))
    }
}

impl fmt::Display for PerformanceCase {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "test_{}", self.name())
    }
}
