//! Device lookup by channel code

use nes_apu::ChannelCode;

use super::device::{
    ChannelDevice, DpcmDevice, Mmc5PulseDevice, NoiseDevice, Pulse2A03Device, SawtoothDevice,
    SilentDevice, TriangleDevice, Vrc6PulseDevice,
};

/// Build the device driving a voice
pub fn select_device(code: ChannelCode) -> Box<dyn ChannelDevice> {
    match code {
        ChannelCode::Pulse1 => Box::new(Pulse2A03Device::new(true)),
        ChannelCode::Pulse2 => Box::new(Pulse2A03Device::new(false)),
        ChannelCode::Triangle => Box::new(TriangleDevice::default()),
        ChannelCode::Noise => Box::new(NoiseDevice::default()),
        ChannelCode::Dpcm => Box::new(DpcmDevice::default()),
        ChannelCode::Vrc6Pulse1 | ChannelCode::Vrc6Pulse2 => Box::new(Vrc6PulseDevice::default()),
        ChannelCode::Vrc6Sawtooth => Box::new(SawtoothDevice::default()),
        ChannelCode::Mmc5Pulse1 | ChannelCode::Mmc5Pulse2 => Box::new(Mmc5PulseDevice::new()),
        _ => {
            log::debug!("channel {} has no generator, rendering silence", code);
            Box::new(SilentDevice)
        }
    }
}
