use std::fmt;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

/// Timed stages of one frame, in execution order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FrameStage {
    Detecting,
    Resolving,
    Correlating,
    Estimating,
}

impl FrameStage {
    pub fn name(self) -> &'static str {
        match self {
            FrameStage::Detecting => "detect",
            FrameStage::Resolving => "resolve",
            FrameStage::Correlating => "correlate",
            FrameStage::Estimating => "estimate",
        }
    }
}

/// Wall-clock duration of each stage that ran.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FrameTiming {
    stages: Vec<(FrameStage, Duration)>,
}

impl FrameTiming {
    pub fn record(&mut self, stage: FrameStage, elapsed: Duration) {
        self.stages.push((stage, elapsed));
    }

    /// Run `f` and record how long it took.
    pub fn measure<T>(&mut self, stage: FrameStage, f: impl FnOnce() -> T) -> T {
        let start = Instant::now();
        let out = f();
        self.record(stage, start.elapsed());
        out
    }

    pub fn get(&self, stage: FrameStage) -> Option<Duration> {
        self.stages
            .iter()
            .find(|(s, _)| *s == stage)
            .map(|(_, d)| *d)
    }

    pub fn stages(&self) -> &[(FrameStage, Duration)] {
        &self.stages
    }

    pub fn total(&self) -> Duration {
        self.stages.iter().map(|(_, d)| *d).sum()
    }
}

impl fmt::Display for FrameTiming {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (stage, d) in &self.stages {
            write!(f, "{} {:.3} ms | ", stage.name(), d.as_secs_f64() * 1e3)?;
        }
        write!(f, "total {:.3} ms", self.total().as_secs_f64() * 1e3)
    }
}
