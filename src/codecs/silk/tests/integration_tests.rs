//! End-to-end encode/decode scenarios.

use crate::codecs::silk::decoder::SilkDecoder;
use crate::codecs::silk::encoder::SilkEncoder;
use crate::codecs::silk::types::Bandwidth;
use crate::types::SilkConfig;

fn wb_config(bitrate: u32) -> SilkConfig {
    SilkConfig::new(Bandwidth::Wide)
        .with_sample_rate(16_000)
        .with_bitrate(bitrate)
        .with_frame_ms(20)
}

fn sine(len: usize, freq_hz: f64, fs_hz: f64, amp: f64) -> Vec<i16> {
    (0..len)
        .map(|i| (amp * (2.0 * std::f64::consts::PI * freq_hz * i as f64 / fs_hz).sin()) as i16)
        .collect()
}

fn rms_i16(x: &[i16]) -> f64 {
    let e: f64 = x.iter().map(|&v| v as f64 * v as f64).sum();
    (e / x.len().max(1) as f64).sqrt()
}

fn rms_f32(x: &[f32]) -> f64 {
    let e: f64 = x.iter().map(|&v| v as f64 * v as f64).sum();
    (e / x.len().max(1) as f64).sqrt()
}

/// Goertzel energy of one frequency bin.
fn goertzel(x: &[f32], freq_hz: f64, fs_hz: f64) -> f64 {
    let w = 2.0 * std::f64::consts::PI * freq_hz / fs_hz;
    let coef = 2.0 * w.cos();
    let (mut s1, mut s2) = (0.0f64, 0.0f64);
    for &v in x {
        let s0 = v as f64 + coef * s1 - s2;
        s2 = s1;
        s1 = s0;
    }
    s1 * s1 + s2 * s2 - coef * s1 * s2
}

#[test]
fn test_silence_roundtrip() {
    let mut enc = SilkEncoder::new(wb_config(20_000)).unwrap();
    let mut dec = SilkDecoder::new(Bandwidth::Wide, 20, false).unwrap();
    let silence = vec![0i16; 320];
    for _ in 0..5 {
        let payload = enc.encode(&silence).unwrap();
        assert!(payload.len() <= 14, "silence payload {} bytes", payload.len());
        let out = dec.decode(Some(&payload)).unwrap();
        assert_eq!(out.len(), 960);
        let peak = out.iter().map(|v| (v.abs() * 32_768.0) as i32).max().unwrap();
        assert!(peak < 200, "silence decoded with peak {}", peak);
    }
}

#[test]
fn test_final_range_checksum_matches() {
    let mut enc = SilkEncoder::new(wb_config(24_000)).unwrap();
    let mut dec = SilkDecoder::new(Bandwidth::Wide, 20, false).unwrap();
    let x = sine(320, 440.0, 16_000.0, 8000.0);
    for _ in 0..6 {
        let payload = enc.encode(&x).unwrap();
        dec.decode(Some(&payload)).unwrap();
        assert_eq!(
            dec.final_range(),
            enc.final_range(),
            "range checksum mismatch"
        );
    }
}

#[test]
fn test_two_encoders_are_byte_identical() {
    let x = sine(320, 380.0, 16_000.0, 9000.0);
    let run = || {
        let mut enc = SilkEncoder::new(wb_config(24_000)).unwrap();
        (0..10).map(|_| enc.encode(&x).unwrap()).collect::<Vec<_>>()
    };
    assert_eq!(run(), run());
}

#[test]
fn test_sinusoid_rms_preserved() {
    let mut enc = SilkEncoder::new(wb_config(32_000)).unwrap();
    let mut dec = SilkDecoder::new(Bandwidth::Wide, 20, false).unwrap();
    // 200 ms of 1 kHz at amplitude 0.3
    let amp = 0.3 * 32_768.0;
    let mut decoded = Vec::new();
    for f in 0..10 {
        let mut x = vec![0i16; 320];
        for (i, v) in x.iter_mut().enumerate() {
            let t = (f * 320 + i) as f64;
            *v = (amp * (2.0 * std::f64::consts::PI * 1000.0 * t / 16_000.0).sin()) as i16;
        }
        let payload = enc.encode(&x).unwrap();
        decoded.extend(dec.decode(Some(&payload)).unwrap());
    }
    // Skip two warm-up frames
    let steady = &decoded[2 * 960..];
    let out_rms = rms_f32(steady) * 32_768.0;
    let in_rms = amp / 2f64.sqrt();
    let ratio = out_rms / in_rms;
    assert!(
        (0.63..=1.58).contains(&ratio),
        "RMS ratio {:.3} outside +-4 dB (out {:.0}, in {:.0})",
        ratio,
        out_rms,
        in_rms
    );
    // Dominant frequency stays at 1 kHz
    let e_1k = goertzel(steady, 1000.0, 48_000.0);
    let e_500 = goertzel(steady, 500.0, 48_000.0);
    let e_2k = goertzel(steady, 2000.0, 48_000.0);
    assert!(e_1k > 4.0 * e_500, "1 kHz {:.1} vs 500 Hz {:.1}", e_1k, e_500);
    assert!(e_1k > 4.0 * e_2k, "1 kHz {:.1} vs 2 kHz {:.1}", e_1k, e_2k);
}

#[test]
fn test_packet_loss_with_fec_recovery() {
    let cfg = wb_config(24_000).with_packet_loss(20).with_lbrr(true);
    let mut enc = SilkEncoder::new(cfg).unwrap();
    let mut dec = SilkDecoder::new(Bandwidth::Wide, 20, false).unwrap();
    // Speech-like signal loud enough to arm LBRR
    let mut packets = Vec::new();
    let mut frame_inputs = Vec::new();
    for f in 0..10 {
        let mut x = vec![0i16; 320];
        for (i, v) in x.iter_mut().enumerate() {
            let t = (f * 320 + i) as f64;
            *v = (9000.0 * (2.0 * std::f64::consts::PI * 220.0 * t / 16_000.0).sin()
                + 3000.0 * (2.0 * std::f64::consts::PI * 660.0 * t / 16_000.0).sin())
                as i16;
        }
        packets.push(enc.encode(&x).unwrap());
        frame_inputs.push(x);
    }
    // LBRR for frame f rides in packet f+1; it needs a frame of warm-up
    assert!(
        dec.has_lbrr(&packets[6]).unwrap(),
        "LBRR must be flagged in the follow-on packet"
    );
    // Decode 0..=4 normally, drop 5, recover from packet 6
    for p in &packets[..5] {
        dec.decode(Some(p)).unwrap();
    }
    let recovered = dec.decode_fec(&packets[6]).unwrap();
    assert!(!dec.last_frame_lost());
    let rec_rms = rms_f32(&recovered) * 32_768.0;
    let orig_rms = rms_i16(&frame_inputs[5]);
    let ratio = rec_rms / orig_rms;
    assert!(
        (0.35..=2.85).contains(&ratio),
        "FEC recovery RMS off: {:.0} vs {:.0}",
        rec_rms,
        orig_rms
    );
    // And the stream continues
    for p in &packets[6..] {
        dec.decode(Some(p)).unwrap();
    }
}

#[test]
fn test_packet_loss_without_fec() {
    let mut enc = SilkEncoder::new(wb_config(24_000)).unwrap();
    let mut dec = SilkDecoder::new(Bandwidth::Wide, 20, false).unwrap();
    let mut packets = Vec::new();
    for f in 0..10 {
        let mut x = vec![0i16; 320];
        for (i, v) in x.iter_mut().enumerate() {
            let t = (f * 320 + i) as f64;
            *v = (8000.0 * (2.0 * std::f64::consts::PI * 200.0 * t / 16_000.0).sin()) as i16;
        }
        packets.push(enc.encode(&x).unwrap());
    }
    for p in &packets[..5] {
        dec.decode(Some(p)).unwrap();
    }
    // Three consecutive losses: concealment output tapers but stays alive
    let mut energies = Vec::new();
    for _ in 0..3 {
        let out = dec.decode(None).unwrap();
        assert!(dec.last_frame_lost());
        let e: f64 = out.iter().map(|&v| v as f64 * v as f64).sum();
        assert!(e > 0.0, "concealment must not be silent");
        energies.push(e);
    }
    assert!(
        energies[2] < energies[0] * 1.5,
        "loss energy must not grow: {:?}",
        energies
    );
    // Recovery: glue ramp, no click at the boundary
    let last_concealed = dec.decode(None).unwrap();
    let recovered = dec.decode(Some(&packets[5])).unwrap();
    assert!(!dec.last_frame_lost());
    let boundary_jump = ((recovered[0] - *last_concealed.last().unwrap()) * 32_768.0).abs();
    assert!(boundary_jump < 30_000.0, "click at boundary: {}", boundary_jump);
    for p in &packets[6..] {
        dec.decode(Some(p)).unwrap();
    }
}

#[test]
fn test_bandwidth_switch_wb_to_nb() {
    // 40 ms WB then 40 ms NB; the decoder switches mid-stream
    let wb_cfg = SilkConfig::new(Bandwidth::Wide)
        .with_sample_rate(16_000)
        .with_bitrate(24_000)
        .with_frame_ms(40);
    let nb_cfg = SilkConfig::new(Bandwidth::Narrow)
        .with_sample_rate(8_000)
        .with_bitrate(16_000)
        .with_frame_ms(40);
    let mut enc_wb = SilkEncoder::new(wb_cfg).unwrap();
    let mut enc_nb = SilkEncoder::new(nb_cfg).unwrap();
    let mut dec = SilkDecoder::new(Bandwidth::Wide, 40, false).unwrap();

    let x_wb = sine(640, 500.0, 16_000.0, 8000.0);
    let p_wb = enc_wb.encode(&x_wb).unwrap();
    let out_wb = dec.decode(Some(&p_wb)).unwrap();
    assert_eq!(out_wb.len(), 1920);

    dec.set_bandwidth(Bandwidth::Narrow);
    let x_nb = sine(320, 500.0, 8_000.0, 8000.0);
    let p_nb = enc_nb.encode(&x_nb).unwrap();
    let out_nb = dec.decode(Some(&p_nb)).unwrap();
    assert_eq!(out_nb.len(), 1920);
    for &v in out_wb.iter().chain(out_nb.iter()) {
        assert!(v.is_finite());
        assert!(v.abs() <= 1.0 + 1e-3);
    }
}

#[test]
fn test_stereo_roundtrip_and_lbrr_flags() {
    let cfg = SilkConfig::new(Bandwidth::Wide)
        .with_sample_rate(16_000)
        .with_bitrate(40_000)
        .with_frame_ms(20)
        .with_stereo(true)
        .with_packet_loss(20)
        .with_lbrr(true);
    let mut enc = SilkEncoder::new(cfg).unwrap();
    let mut dec = SilkDecoder::new(Bandwidth::Wide, 20, true).unwrap();
    let mut lbrr_seen = false;
    for f in 0..8 {
        let mut inter = vec![0i16; 640];
        for i in 0..320 {
            let t = (f * 320 + i) as f64;
            let l = (9000.0 * (2.0 * std::f64::consts::PI * 300.0 * t / 16_000.0).sin()) as i16;
            let r = (6000.0 * (2.0 * std::f64::consts::PI * 300.0 * t / 16_000.0).sin()) as i16;
            inter[2 * i] = l;
            inter[2 * i + 1] = r;
        }
        let payload = enc.encode(&inter).unwrap();
        if f > 1 {
            lbrr_seen |= dec.has_lbrr(&payload).unwrap();
        }
        let out = dec.decode(Some(&payload)).unwrap();
        assert_eq!(out.len(), 2 * 960);
    }
    assert!(lbrr_seen, "active stereo stream must carry LBRR");
}

#[test]
fn test_40ms_multiframe_packets() {
    let cfg = SilkConfig::new(Bandwidth::Medium)
        .with_sample_rate(12_000)
        .with_bitrate(20_000)
        .with_frame_ms(40);
    let mut enc = SilkEncoder::new(cfg).unwrap();
    let mut dec = SilkDecoder::new(Bandwidth::Medium, 40, false).unwrap();
    let x = sine(960, 450.0, 12_000.0, 7000.0);
    for _ in 0..4 {
        let payload = enc.encode(&x).unwrap();
        let out = dec.decode(Some(&payload)).unwrap();
        assert_eq!(out.len(), 1920);
        assert_eq!(dec.final_range(), enc.final_range());
    }
}

#[test]
fn test_decoder_survives_corrupt_payload() {
    let mut enc = SilkEncoder::new(wb_config(24_000)).unwrap();
    let mut dec = SilkDecoder::new(Bandwidth::Wide, 20, false).unwrap();
    let x = sine(320, 400.0, 16_000.0, 8000.0);
    let good = enc.encode(&x).unwrap();
    dec.decode(Some(&good)).unwrap();
    // Feed garbage; either a decode error or junk output is acceptable,
    // but the decoder must stay usable afterwards
    let garbage: Vec<u8> = (0..good.len()).map(|i| (i * 37 + 11) as u8).collect();
    let _ = dec.decode(Some(&garbage));
    let next = enc.encode(&x).unwrap();
    let out = dec.decode(Some(&next)).unwrap();
    assert_eq!(out.len(), 960);
}

#[test]
fn test_noise_input_is_handled() {
    use rand::{Rng, SeedableRng};
    let mut rng = rand::rngs::StdRng::seed_from_u64(0x5EED_CAFE);
    let mut enc = SilkEncoder::new(wb_config(24_000)).unwrap();
    let mut dec = SilkDecoder::new(Bandwidth::Wide, 20, false).unwrap();
    for _ in 0..6 {
        let x: Vec<i16> = (0..320).map(|_| rng.gen_range(-12_000..12_000)).collect();
        let payload = enc.encode(&x).unwrap();
        let out = dec.decode(Some(&payload)).unwrap();
        assert_eq!(out.len(), 960);
        for &v in out.iter() {
            assert!(v.is_finite() && v.abs() <= 1.0 + 1e-3);
        }
        assert_eq!(dec.final_range(), enc.final_range());
    }
}

#[test]
fn test_48k_api_rate_roundtrip() {
    let cfg = SilkConfig::new(Bandwidth::Wide)
        .with_sample_rate(48_000)
        .with_bitrate(24_000)
        .with_frame_ms(20);
    let mut enc = SilkEncoder::new(cfg).unwrap();
    let mut dec = SilkDecoder::new(Bandwidth::Wide, 20, false).unwrap();
    let mut total_rms = 0.0;
    for f in 0..6 {
        let mut x = vec![0i16; 960];
        for (i, v) in x.iter_mut().enumerate() {
            let t = (f * 960 + i) as f64;
            *v = (8000.0 * (2.0 * std::f64::consts::PI * 700.0 * t / 48_000.0).sin()) as i16;
        }
        let payload = enc.encode(&x).unwrap();
        let out = dec.decode(Some(&payload)).unwrap();
        assert_eq!(out.len(), 960);
        if f >= 2 {
            total_rms += rms_f32(&out);
        }
    }
    assert!(total_rms > 0.01, "decoded stream is silent");
}
