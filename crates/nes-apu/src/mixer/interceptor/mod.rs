//! Post-processing stages of the per-sample mixer
//!
//! An interceptor sees every output sample of a chip group or of an output
//! track and returns the processed value. Stages are chained in order and
//! each can be switched off at runtime without losing its state.

mod amplifier;
mod compressor;
mod dc_filter;
mod echo;
mod filter;

pub use amplifier::Amplifier;
pub use compressor::Compressor;
pub use dc_filter::DcFilter;
pub use echo::EchoUnit;
pub use filter::LowPassFilter;

/// A single post-processing stage
pub trait SoundInterceptor {
    /// Process one sample
    ///
    /// # Arguments
    ///
    /// * `value` - Input sample
    /// * `time` - CPU cycles covered by this sample
    fn execute(&mut self, value: i32, time: u32) -> i32;

    /// Clear the stage's history
    fn reset(&mut self);

    /// Adapt to a new output sample rate
    fn set_rate(&mut self, _rate: u32) {}

    /// Whether the stage takes part in the chain
    fn is_enabled(&self) -> bool;

    /// Switch the stage on or off
    fn set_enabled(&mut self, enabled: bool);
}

/// Stage selector used to toggle built-in stages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InterceptorKind {
    /// [`EchoUnit`]
    Echo,
    /// [`DcFilter`]
    DcFilter,
    /// [`LowPassFilter`]
    LowPass,
    /// [`Compressor`]
    Compressor,
    /// [`Amplifier`]
    Amplifier,
}

/// Built-in stages as one closed set
#[derive(Debug, Clone)]
pub enum Interceptor {
    /// Multi-tap echo
    Echo(EchoUnit),
    /// DC blocking high-pass
    DcFilter(DcFilter),
    /// RC low-pass
    LowPass(LowPassFilter),
    /// Threshold compressor
    Compressor(Compressor),
    /// Gain with soft or hard limiting
    Amplifier(Amplifier),
}

impl Interceptor {
    /// Which kind of stage this is
    pub fn kind(&self) -> InterceptorKind {
        match self {
            Interceptor::Echo(_) => InterceptorKind::Echo,
            Interceptor::DcFilter(_) => InterceptorKind::DcFilter,
            Interceptor::LowPass(_) => InterceptorKind::LowPass,
            Interceptor::Compressor(_) => InterceptorKind::Compressor,
            Interceptor::Amplifier(_) => InterceptorKind::Amplifier,
        }
    }

    fn stage(&self) -> &dyn SoundInterceptor {
        match self {
            Interceptor::Echo(i) => i,
            Interceptor::DcFilter(i) => i,
            Interceptor::LowPass(i) => i,
            Interceptor::Compressor(i) => i,
            Interceptor::Amplifier(i) => i,
        }
    }

    fn stage_mut(&mut self) -> &mut dyn SoundInterceptor {
        match self {
            Interceptor::Echo(i) => i,
            Interceptor::DcFilter(i) => i,
            Interceptor::LowPass(i) => i,
            Interceptor::Compressor(i) => i,
            Interceptor::Amplifier(i) => i,
        }
    }
}

impl SoundInterceptor for Interceptor {
    #[inline]
    fn execute(&mut self, value: i32, time: u32) -> i32 {
        self.stage_mut().execute(value, time)
    }

    fn reset(&mut self) {
        self.stage_mut().reset();
    }

    fn set_rate(&mut self, rate: u32) {
        self.stage_mut().set_rate(rate);
    }

    fn is_enabled(&self) -> bool {
        self.stage().is_enabled()
    }

    fn set_enabled(&mut self, enabled: bool) {
        self.stage_mut().set_enabled(enabled);
    }
}

/// Run `value` through every enabled stage in order
#[inline]
pub fn run_chain(chain: &mut [Interceptor], value: i32, time: u32) -> i32 {
    chain
        .iter_mut()
        .filter(|stage| stage.is_enabled())
        .fold(value, |v, stage| stage.execute(v, time))
}

/// Toggle every stage of `kind` in a chain; returns whether one was found
pub fn set_kind_enabled(chain: &mut [Interceptor], kind: InterceptorKind, enabled: bool) -> bool {
    let mut found = false;
    for stage in chain.iter_mut().filter(|stage| stage.kind() == kind) {
        stage.set_enabled(enabled);
        found = true;
    }
    found
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_stage_is_skipped() {
        let mut amp = Amplifier::new();
        amp.set_volume(200);
        let mut chain = vec![Interceptor::Amplifier(amp)];
        assert_eq!(run_chain(&mut chain, 1000, 37), 2000);

        assert!(set_kind_enabled(&mut chain, InterceptorKind::Amplifier, false));
        assert_eq!(run_chain(&mut chain, 1000, 37), 1000);
    }

    #[test]
    fn test_toggle_unknown_kind() {
        let mut chain = vec![Interceptor::Compressor(Compressor::new(1.0, 1.0, 1.0))];
        assert!(!set_kind_enabled(&mut chain, InterceptorKind::Echo, false));
        assert_eq!(chain[0].kind(), InterceptorKind::Compressor);
        assert!(chain[0].is_enabled());
    }
}
