//! Performance test base for the IOR and mdtest benchmarks.
//!
//! The benchmarks themselves, and the pools and containers they run against,
//! are provided by a [`BenchmarkHarness`]. This module only decides what to
//! run, in which order, and reports the parameters of each run.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use crate::config::load_yaml;
use crate::error::Error;
use crate::log::{LogSink, TracingSink};

mod cases;

pub use cases::PerformanceCase;


const IOR_EASY_WRITE_FLAGS: &str = "-w -C -e -g -G 27 -k -Q 1 -v";
const IOR_EASY_READ_FLAGS: &str = "-r -R -C -e -g -G 27 -k -Q 1 -v";

// Needs more server nodes than any current test layout provides.
const UNSUPPORTED_OCLASS: &str = "EC_16P2GX";


#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Benchmark {
    Ior,
    Mdtest,
}

impl FromStr for Benchmark {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "ior" => Ok(Self::Ior),
            "mdtest" => Ok(Self::Mdtest),
            _ => Err(Error::InvalidBenchmark(s.to_string())),
        }
    }
}

impl fmt::Display for Benchmark {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Ior => write!(f, "ior"),
            Self::Mdtest => write!(f, "mdtest"),
        }
    }
}


#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IorParams {
    pub dfs_oclass: Option<String>,
    pub transfer_size: Option<String>,
    pub block_size: Option<String>,
    pub sw_deadline: Option<u64>,
    pub sw_wearout: Option<u64>,
    pub dfs_chunk: Option<String>,
    /// Flags for the next run; set by the test before each phase.
    pub flags: Option<String>,
    pub write_flags: Option<String>,
    pub read_flags: Option<String>,
}


#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MdtestParams {
    pub dfs_oclass: Option<String>,
    pub dfs_dir_oclass: Option<String>,
    pub stonewall_timer: Option<u64>,
    pub dfs_chunk: Option<String>,
    pub flags: Option<String>,
}


#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PerformanceConfig {
    pub test_id: String,
    #[serde(default)]
    pub servers: Vec<String>,
    #[serde(default)]
    pub clients: Vec<String>,
    pub processes: u32,
    #[serde(default)]
    pub ior: IorParams,
    #[serde(default)]
    pub mdtest: MdtestParams,
}

impl PerformanceConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, Error> {
        load_yaml(path.as_ref())
    }
}


/// Runs the benchmarks against a provisioned pool.
pub trait BenchmarkHarness {
    fn run_ior_with_pool(&mut self, ior: &IorParams, create_cont: bool) -> Result<(), Error>;

    fn execute_mdtest(&mut self, mdtest: &MdtestParams) -> Result<(), Error>;
}


pub struct PerformanceTest<H> {
    pub config: PerformanceConfig,
    pub harness: H,
    log: Arc<dyn LogSink>,
}

impl<H> PerformanceTest<H> {
    pub fn new(config: PerformanceConfig, harness: H) -> Self {
        Self {
            config,
            harness,
            log: Arc::new(TracingSink),
        }
    }

    pub fn with_log(mut self, log: Arc<dyn LogSink>) -> Self {
        self.log = log;
        self
    }

    /// The `NAME, VALUE` pairs describing a run of `benchmark`.
    pub fn performance_params(
        &self,
        benchmark: Benchmark,
    ) -> Result<Vec<(&'static str, String)>, Error> {
        let config = &self.config;
        if config.clients.is_empty() {
            return Err(Error::NoClients);
        }
        let per_client = f64::from(config.processes) / config.clients.len() as f64;

        let mut params = vec![
            ("TEST_NAME", config.test_id.clone()),
            ("NUM_SERVERS", config.servers.len().to_string()),
            ("NUM_CLIENTS", config.clients.len().to_string()),
            ("PPC", per_client.to_string()),
            ("PPN", per_client.to_string()),
        ];

        match benchmark {
            Benchmark::Ior => {
                let ior = &config.ior;
                params.extend([
                    ("OCLASS", show(&ior.dfs_oclass)),
                    ("XFER_SIZE", show(&ior.transfer_size)),
                    ("BLOCK_SIZE", show(&ior.block_size)),
                    ("SW_TIME", show(&ior.sw_deadline)),
                    ("CHUNK_SIZE", show(&ior.dfs_chunk)),
                ]);
            }
            Benchmark::Mdtest => {
                let mdtest = &config.mdtest;
                params.extend([
                    ("OCLASS", show(&mdtest.dfs_oclass)),
                    ("DIR_OCLASS", show(&mdtest.dfs_dir_oclass)),
                    ("SW_TIME", show(&mdtest.stonewall_timer)),
                    ("CHUNK_SIZE", show(&mdtest.dfs_chunk)),
                ]);
            }
        }

        Ok(params)
    }

    /// Write the parameters as aligned `NAME : VALUE` lines.
    pub fn print_performance_params(&self, benchmark: Benchmark) -> Result<(), Error> {
        let params = self.performance_params(benchmark)?;
        let width = params.iter().map(|(name, _)| name.len()).max().unwrap_or(0);

        self.log.write_line("PERFORMANCE PARAMS START");
        for (name, value) in params.iter() {
            self.log.write_line(&format!("{:<width$} : {}", name, value, width = width));
        }
        self.log.write_line("PERFORMANCE PARAMS END");
        Ok(())
    }
}

impl<H: BenchmarkHarness> PerformanceTest<H> {

    /// Write then read with IOR, reusing the container between phases.
    ///
    /// Flags left as `None` fall back to the configured write and read flags.
    pub fn run_performance_ior(
        &mut self,
        write_flags: Option<&str>,
        read_flags: Option<&str>,
    ) -> Result<(), Error> {
        let write_flags = write_flags
            .map(str::to_string)
            .or_else(|| self.config.ior.write_flags.clone());
        let read_flags = read_flags
            .map(str::to_string)
            .or_else(|| self.config.ior.read_flags.clone());

        self.print_performance_params(Benchmark::Ior)?;
        check_oclass(&self.config.ior.dfs_oclass)?;

        self.log.write_line("Running IOR write");
        self.config.ior.flags = write_flags;
        self.harness.run_ior_with_pool(&self.config.ior, true)?;

        self.log.write_line("Running IOR read");
        let ior = &mut self.config.ior;
        ior.flags = read_flags;
        ior.sw_wearout = None;
        ior.sw_deadline = None;
        self.harness.run_ior_with_pool(&self.config.ior, false)
    }

    pub fn run_performance_ior_easy(&mut self) -> Result<(), Error> {
        let ior = &self.config.ior;
        let write_flags = ior.write_flags.clone().unwrap_or_else(|| IOR_EASY_WRITE_FLAGS.to_string());
        let read_flags = ior.read_flags.clone().unwrap_or_else(|| IOR_EASY_READ_FLAGS.to_string());
        self.run_performance_ior(Some(&write_flags), Some(&read_flags))
    }

    pub fn run_performance_mdtest(&mut self, flags: Option<&str>) -> Result<(), Error> {
        if let Some(flags) = flags {
            self.config.mdtest.flags = Some(flags.to_string());
        }
        self.print_performance_params(Benchmark::Mdtest)?;
        check_oclass(&self.config.mdtest.dfs_oclass)?;

        self.log.write_line("Running MDTEST");
        self.harness.execute_mdtest(&self.config.mdtest)
    }
}


fn check_oclass(oclass: &Option<String>) -> Result<(), Error> {
    match oclass.as_deref() {
        Some(UNSUPPORTED_OCLASS) => Err(Error::TestFailed("Need more nodes".to_string())),
        _ => Ok(()),
    }
}


fn show<T: fmt::Display>(value: &Option<T>) -> String {
    match value {
        Some(value) => value.to_string(),
        None => "None".to_string(),
    }
}
