// Audio file I/O and playback for the compatibility shim

// Decoder chain and reference loading
pub mod codec;

pub mod playback;
pub mod resample;

// WAV reading/writing
pub mod wav;

pub use codec::{load_waveform, AudioDecoder, DecodedAudio, DecoderChain};
pub use playback::{find_on_path, play_wav, select_player, PlayerCommand};
pub use resample::{downmix, resample_linear, resample_waveform, resampled_len};
pub use wav::{quantize_sample, save_waveform, WavDecoder};
