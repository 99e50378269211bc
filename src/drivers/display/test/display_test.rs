//! Testes de lifecycle, power, conexão, modos e mirror

use alloc::boxed::Box;
use alloc::format;
use alloc::sync::Arc;
use alloc::vec;

use core::sync::atomic::{AtomicBool, Ordering};

use spin::Mutex;

use super::fake::{FakeDriver, FakeShared};
use crate::drivers::display::cursor::CursorImage;
use crate::drivers::display::{
    FbEvent, FbListener, Framebuffer, FramebufferConfig, GraphicsSubsystem, PowerChange,
};
use crate::sys::error::GfxError;
use crate::sys::types::*;

// ============================================================================
// HELPERS
// ============================================================================

fn config(tag: &'static str) -> FramebufferConfig {
    FramebufferConfig {
        name: tag,
        ..Default::default()
    }
}

/// Device enumerado (transições de power diferidas).
fn setup(tag: &'static str) -> (Arc<GraphicsSubsystem>, Arc<Framebuffer>, Arc<FakeShared>) {
    let sys = GraphicsSubsystem::new();
    let (drv, shared) = FakeDriver::new(tag);
    let fb = sys.register(Box::new(drv), config(tag)).unwrap();
    (sys, fb, shared)
}

/// Device NÃO enumerado (transições síncronas).
fn setup_sync(tag: &'static str) -> (Arc<GraphicsSubsystem>, Arc<Framebuffer>, Arc<FakeShared>) {
    let sys = GraphicsSubsystem::new();
    let (drv, shared) = FakeDriver::new(tag);
    let fb = sys.create_framebuffer(Box::new(drv), config(tag)).unwrap();
    (sys, fb, shared)
}

fn timing_1080p() -> DetailedTiming {
    DetailedTiming {
        pixel_clock: 148_500_000,
        horizontal_active: 1920,
        horizontal_blanking: 280,
        horizontal_sync_offset: 88,
        horizontal_sync_width: 44,
        horizontal_border: 0,
        vertical_active: 1080,
        vertical_blanking: 45,
        vertical_sync_offset: 4,
        vertical_sync_width: 5,
        vertical_border: 0,
        signal: SignalConfig::empty(),
        scaler: None,
    }
}

fn gamma(v: u16) -> GammaTable {
    GammaTable {
        channels: 1,
        count: 4,
        width: 16,
        data: vec![v; 4],
    }
}

struct TraceListener {
    shared: Arc<FakeShared>,
}

impl FbListener for TraceListener {
    fn framebuffer_event(&self, fb: &Framebuffer, event: FbEvent) {
        let name = match event {
            FbEvent::WillSleep => "WillSleep",
            FbEvent::DidWake => "DidWake",
            FbEvent::ConnectChange { .. } => "ConnectChange",
        };
        self.shared.push(format!("{} ev {}", fb.name(), name));
    }
}

/// Listener que registra se a cadeia INTEIRA já estava suspensa quando a
/// notificação chegou.
struct SuspendCheck {
    shared: Arc<FakeShared>,
    peers: Mutex<alloc::vec::Vec<Arc<Framebuffer>>>,
}

impl FbListener for SuspendCheck {
    fn framebuffer_event(&self, _fb: &Framebuffer, event: FbEvent) {
        if let FbEvent::ConnectChange { .. } = event {
            let all = self.peers.lock().iter().all(|f| f.is_suspended());
            self.shared.push(format!("check all-suspended {}", all));
        }
    }
}

// ============================================================================
// LIFECYCLE / CANAL
// ============================================================================

#[test]
fn calls_before_open_return_not_open() {
    let (_sys, fb, _shared) = setup("A");
    assert_eq!(fb.set_gamma_table(&gamma(1)), Err(GfxError::NotOpen));
    assert!(fb.display_modes().is_err());
}

#[test]
fn open_wakes_and_reads_connection() {
    let (_sys, fb, shared) = setup("A");
    fb.open().unwrap();
    assert_eq!(fb.power_state(), DevicePowerState::Wake);
    assert!(fb.is_online());
    assert_eq!(shared.count("A power 2"), 1);

    // Segundo open só conta referência.
    shared.clear();
    fb.open().unwrap();
    assert_eq!(shared.count("power"), 0);

    // Último close derruba para Doze.
    fb.close();
    assert_eq!(fb.power_state(), DevicePowerState::Wake);
    fb.close();
    assert_eq!(fb.power_state(), DevicePowerState::Doze);
}

#[test]
fn failed_open_is_retryable() {
    let (_sys, fb, shared) = setup("A");
    shared.fail_open.store(true, Ordering::Release);
    assert_eq!(fb.open(), Err(GfxError::NotReady));
    assert!(!fb.is_opened());

    // Close sem open bem-sucedido não mexe em power.
    fb.close();
    assert_eq!(shared.count("power"), 0);

    // O retry refaz o handshake do zero.
    fb.open().unwrap();
    assert!(fb.is_opened());
    assert_eq!(fb.power_state(), DevicePowerState::Wake);
    assert_eq!(shared.count("A power 2"), 1);
}

#[test]
fn dead_device_latches_unsupported() {
    let (_sys, fb, _shared) = setup("A");
    fb.open().unwrap();
    fb.mark_dead();
    assert_eq!(fb.display_modes(), Err(GfxError::Unsupported));
    assert_eq!(fb.request_probe(), Err(GfxError::Unsupported));
    assert_eq!(
        fb.set_display_mode(DisplayModeId(1), 0),
        Err(GfxError::Unsupported)
    );
}

// ============================================================================
// MODOS
// ============================================================================

#[test]
fn enumerates_and_describes_modes() {
    let (_sys, fb, _shared) = setup("A");
    fb.open().unwrap();
    let modes = fb.display_modes().unwrap();
    assert_eq!(modes.len(), 2);
    for id in modes {
        let info = fb.mode_info(id).unwrap();
        assert!(info.nominal_width > 0);
        assert!(info.nominal_height > 0);
        assert!(info.flags.contains(ModeFlags::VALID));
        assert_eq!(info.max_depth_index, 2);
    }
}

#[test]
fn set_mode_maps_dense_depth_index() {
    let (_sys, fb, _shared) = setup("A");
    fb.open().unwrap();
    fb.set_display_mode(DisplayModeId(2), 2).unwrap();
    assert_eq!(
        fb.current_display_mode().unwrap(),
        (DisplayModeId(2), 2)
    );
    let info = fb.pixel_info(DisplayModeId(2), 2).unwrap();
    assert_eq!(info.bits_per_pixel, 32);

    // Índice fora da faixa é fixado no maior válido.
    fb.set_display_mode(DisplayModeId(1), 9).unwrap();
    assert_eq!(fb.current_display_mode().unwrap().1, 2);
}

#[test]
fn synthetic_revalidation_is_free() {
    let (_sys, fb, shared) = setup("A");
    fb.open().unwrap();
    let ids = fb.set_detailed_timings(vec![timing_1080p()]).unwrap();
    assert_eq!(ids.len(), 1);
    assert!(ids[0].is_synthetic());

    fb.validate_mode(ids[0]).unwrap();
    assert_eq!(shared.count("SetDetailedTiming"), 1);

    // Revalidar sem trocar a tabela: nenhuma chamada nova ao driver.
    fb.validate_mode(ids[0]).unwrap();
    assert_eq!(shared.count("SetDetailedTiming"), 1);

    // Tabela nova invalida tudo de uma vez.
    let ids = fb.set_detailed_timings(vec![timing_1080p()]).unwrap();
    fb.validate_mode(ids[0]).unwrap();
    assert_eq!(shared.count("SetDetailedTiming"), 2);
}

#[test]
fn synthetic_mode_describes_from_timing() {
    let (_sys, fb, _shared) = setup("A");
    fb.open().unwrap();
    let ids = fb.set_detailed_timings(vec![timing_1080p()]).unwrap();
    let info = fb.mode_info(ids[0]).unwrap();
    assert_eq!(info.nominal_width, 1920);
    assert_eq!(info.nominal_height, 1080);
    assert_eq!(info.refresh_rate.int_part(), 60);
    assert!(info.flags.contains(ModeFlags::NOT_PRESET));
}

// ============================================================================
// POWER
// ============================================================================

#[test]
fn sleep_notifies_before_touching_hardware() {
    let (_sys, fb, shared) = setup_sync("A");
    fb.add_listener(Arc::new(TraceListener {
        shared: Arc::clone(&shared),
    }));
    fb.open().unwrap();

    shared.clear();
    assert_eq!(fb.request_power_state(0).unwrap(), PowerChange::Done);
    let notified = shared.index_of("A ev WillSleep").unwrap();
    let touched = shared.index_of("A power 0").unwrap();
    assert!(notified < touched);

    shared.clear();
    fb.request_power_state(2).unwrap();
    let touched = shared.index_of("A power 2").unwrap();
    let notified = shared.index_of("A ev DidWake").unwrap();
    assert!(touched < notified);
}

#[test]
fn enrolled_power_requests_are_deferred() {
    let (sys, fb, shared) = setup("A");
    fb.open().unwrap();
    shared.clear();

    match fb.request_power_state(0).unwrap() {
        PowerChange::Deferred { upto_us } => assert!(upto_us > 0),
        PowerChange::Done => panic!("transição devia ser diferida"),
    }
    assert_eq!(fb.power_state(), DevicePowerState::Wake);
    assert!(fb.needs_more_time());

    sys.work().process_all();
    assert_eq!(fb.power_state(), DevicePowerState::Sleep);
    assert!(!fb.needs_more_time());
}

#[test]
fn wake_propagates_through_chain_but_sleep_does_not() {
    let sys = GraphicsSubsystem::new();
    let (da, sa) = FakeDriver::new("A");
    let (db, sb) = FakeDriver::new("B");
    let (dc, sc) = FakeDriver::new("C");
    let a = sys.register(Box::new(da), config("A")).unwrap();
    let b = sys.register(Box::new(db), config("B")).unwrap();
    let c = sys.register(Box::new(dc), config("C")).unwrap();
    sys.link_dependents(&[Arc::clone(&a), Arc::clone(&b), Arc::clone(&c)])
        .unwrap();
    for fb in [&a, &b, &c] {
        fb.open().unwrap();
        fb.request_power_state(0).unwrap();
    }
    sys.work().drain(4);
    for (fb, sh) in [(&a, &sa), (&b, &sb), (&c, &sc)] {
        assert_eq!(fb.power_state(), DevicePowerState::Sleep);
        sh.clear();
    }

    // Wake do líder acorda os seguidores, em ordem de cadeia.
    a.request_power_state(2).unwrap();
    sys.work().drain(4);
    assert_eq!(sa.count("A power 2"), 1);
    assert_eq!(sb.count("B power 2"), 1);
    assert_eq!(sc.count("C power 2"), 1);

    // Sleep do líder NÃO derruba os seguidores.
    sa.clear();
    a.request_power_state(0).unwrap();
    sys.work().drain(4);
    assert_eq!(sa.count("A power 0"), 1);
    assert_eq!(sb.count("B power 0"), 0);
    assert_eq!(sc.count("C power 0"), 0);
    assert_eq!(b.power_state(), DevicePowerState::Wake);
}

#[test]
fn sleep_barrier_waits_for_pending_work() {
    let (sys, fb, _shared) = setup("A");
    fb.open().unwrap();

    fb.request_power_state(0).unwrap();
    let acked = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&acked);
    sys.system_will_sleep(Box::new(move || {
        flag.store(true, Ordering::Release);
    }));
    assert!(!acked.load(Ordering::Acquire));
    assert!(sys.still_paging());

    assert!(sys.work().drain(8));
    assert!(acked.load(Ordering::Acquire));
    sys.system_did_wake();
}

// ============================================================================
// CONEXÃO
// ============================================================================

#[test]
fn connect_change_suspends_whole_chain_before_notifying() {
    let sys = GraphicsSubsystem::new();
    let (da, sa) = FakeDriver::new("A");
    let (db, _sb) = FakeDriver::new("B");
    let a = sys.register(Box::new(da), config("A")).unwrap();
    let b = sys.register(Box::new(db), config("B")).unwrap();
    sys.link_dependents(&[Arc::clone(&a), Arc::clone(&b)]).unwrap();
    a.open().unwrap();
    b.open().unwrap();

    a.add_listener(Arc::new(SuspendCheck {
        shared: Arc::clone(&sa),
        peers: Mutex::new(vec![Arc::clone(&a), Arc::clone(&b)]),
    }));
    sa.clear();

    a.connect_interrupt();
    a.connect_interrupt(); // coalescido
    sys.work().process_all();
    assert_eq!(sa.count("check all-suspended true"), 1);
    assert!(a.is_suspended() && b.is_suspended());

    // Ack é por device: A sai, B continua suspenso.
    a.acknowledge_connect_change().unwrap();
    assert!(!a.is_suspended());
    assert!(b.is_suspended());
    b.acknowledge_connect_change().unwrap();
    assert!(!b.is_suspended());
}

#[test]
fn suspended_device_rejects_mode_set() {
    let (sys, fb, _shared) = setup("A");
    fb.open().unwrap();
    fb.connect_interrupt();
    sys.work().process_all();
    assert_eq!(
        fb.set_display_mode(DisplayModeId(1), 0),
        Err(GfxError::NotReady)
    );
    fb.acknowledge_connect_change().unwrap();
    fb.set_display_mode(DisplayModeId(1), 0).unwrap();
}

#[test]
fn suspended_device_rejects_parameter_set() {
    let (sys, fb, _shared) = setup("A");
    fb.open().unwrap();
    fb.parameter_store().publish("brightness", 100, 0, 255);

    fb.connect_interrupt();
    sys.work().process_all();
    assert_eq!(
        fb.set_parameter("brightness", 50),
        Err(GfxError::NotReady)
    );
    assert_eq!(fb.parameter_store().get("brightness").unwrap().value, 100);

    fb.acknowledge_connect_change().unwrap();
    fb.set_parameter("brightness", 50).unwrap();
    assert_eq!(fb.parameter_store().get("brightness").unwrap().value, 50);
}

#[test]
fn offline_display_reports_offline_mode() {
    let (sys, fb, shared) = setup("A");
    fb.open().unwrap();
    shared.conn.lock().online = false;
    fb.connect_interrupt();
    sys.work().process_all();
    fb.acknowledge_connect_change().unwrap();

    assert!(!fb.is_online());
    assert_eq!(fb.current_display_mode().unwrap(), (OFFLINE_MODE, 0));
    let info = fb.mode_info(OFFLINE_MODE).unwrap();
    assert_eq!(info.nominal_width, 0);
    assert!(info.flags.contains(ModeFlags::NEVER_SHOW));
}

#[test]
fn explicit_probe_goes_through_driver() {
    let (sys, fb, shared) = setup("A");
    fb.open().unwrap();
    shared.clear();
    fb.request_probe().unwrap();
    assert_eq!(shared.count("ctl Probe"), 1);
    assert_eq!(fb.connect_change_count(), 1);

    // Probe com um pendente coalesce.
    fb.request_probe().unwrap();
    assert_eq!(shared.count("ctl Probe"), 1);
    sys.work().process_all();
    fb.acknowledge_connect_change().unwrap();
}

// ============================================================================
// CLAMSHELL
// ============================================================================

#[test]
fn clamshell_suspends_builtin_panels_only() {
    let sys = GraphicsSubsystem::new();
    let (di, si) = FakeDriver::new("interno");
    si.conn.lock().flags = ConnectionFlags::BUILT_IN;
    let (de, _se) = FakeDriver::new("externo");
    let internal = sys.register(Box::new(di), config("interno")).unwrap();
    let external = sys.register(Box::new(de), config("externo")).unwrap();
    internal.open().unwrap();
    external.open().unwrap();

    // Sem votos de enable o fechamento é ignorado.
    sys.set_clamshell_closed(true);
    assert!(!internal.is_suspended());
    sys.set_clamshell_closed(false);

    sys.clamshell_enable_vote(true);
    sys.set_clamshell_closed(true);
    assert!(internal.is_suspended());
    assert!(!external.is_suspended());

    sys.set_clamshell_closed(false);
    assert!(!internal.is_suspended());
}

// ============================================================================
// GAMMA / CLUT
// ============================================================================

#[test]
fn deferred_tables_are_last_write_wins() {
    let (sys, fb, shared) = setup("A");
    fb.open().unwrap();
    fb.set_gamma_format(16, 4);
    fb.set_deferred_updates(true);
    shared.clear();

    fb.set_gamma_table(&gamma(100)).unwrap();
    fb.set_gamma_table(&gamma(200)).unwrap();
    fb.set_color_table(3, ClutOptions::empty(), &[ColorEntry::default()])
        .unwrap();
    assert!(fb.has_staged_tables());
    assert_eq!(shared.count("gamma"), 0); // nada foi ao hardware ainda

    fb.vbl_tick(16_000);
    sys.work().process_all();
    assert_eq!(shared.count("gamma 200"), 1);
    assert_eq!(shared.count("gamma 100"), 0);
    assert_eq!(shared.count("clut 3"), 1);
    assert!(!fb.has_staged_tables());
}

#[test]
fn gamma_width_negotiation_rejects_narrow_source() {
    let (_sys, fb, _shared) = setup("A");
    fb.open().unwrap();
    fb.set_gamma_format(10, 256);
    let narrow = GammaTable {
        channels: 1,
        count: 256,
        width: 8,
        data: vec![0; 256],
    };
    assert_eq!(fb.set_gamma_table(&narrow), Err(GfxError::BadArgument));
}

#[test]
fn connect_change_discards_staged_tables() {
    let (sys, fb, _shared) = setup("A");
    fb.open().unwrap();
    fb.set_gamma_format(16, 4);
    fb.set_deferred_updates(true);
    fb.set_gamma_table(&gamma(7)).unwrap();
    assert!(fb.has_staged_tables());

    fb.connect_interrupt();
    sys.work().process_all();
    assert!(!fb.has_staged_tables());
}

// ============================================================================
// CURSOR
// ============================================================================

#[test]
fn cursor_falls_back_to_software_silently() {
    let (_sys, fb, shared) = setup("A");
    fb.open().unwrap();
    fb.set_display_mode(DisplayModeId(1), 2).unwrap();
    let img = CursorImage {
        width: 2,
        height: 2,
        hot_spot: (0, 0),
        pixels: vec![0xffff_0000; 4],
    };

    shared.fail_cursor_upload.store(true, Ordering::Release);
    fb.set_cursor_image(0, img.clone()).unwrap();
    assert!(!fb.hardware_cursor_active());
    fb.set_cursor_visible(true);
    fb.move_cursor(10, 8);
    assert_eq!(fb.cursor_position(), (10, 8, true));

    shared.fail_cursor_upload.store(false, Ordering::Release);
    fb.set_cursor_image(0, img).unwrap();
    assert!(fb.hardware_cursor_active());
    shared.clear();
    fb.move_cursor(3, 4);
    assert_eq!(shared.count("DrawCursor true"), 1);
    assert_eq!(fb.cursor_position(), (3, 4, true));
}

#[test]
fn cursor_frames_convert_lazily_and_switch_without_reupload() {
    let (_sys, fb, shared) = setup("A");
    fb.open().unwrap();
    fb.set_display_mode(DisplayModeId(1), 2).unwrap();
    let black = CursorImage {
        width: 2,
        height: 2,
        hot_spot: (0, 0),
        pixels: vec![0xff00_0000; 4],
    };
    let white = CursorImage {
        width: 2,
        height: 2,
        hot_spot: (0, 0),
        pixels: vec![0xffff_ffff; 4],
    };

    shared.clear();
    // Frame corrente: converte e sobe na hora.
    fb.set_cursor_image(0, black).unwrap();
    assert!(fb.hardware_cursor_active());
    assert_eq!(shared.count("SetCursorImage"), 1);

    // Frame não-corrente: só guarda a fonte.
    fb.set_cursor_image(1, white).unwrap();
    assert_eq!(fb.cursor_frame(), 0);
    assert_eq!(shared.count("SetCursorImage"), 1);

    // A troca converte o frame novo.
    fb.set_cursor_frame(1).unwrap();
    assert_eq!(fb.cursor_frame(), 1);
    assert_eq!(shared.count("SetCursorImage"), 2);

    // Voltar para um frame já convertido não refaz upload.
    fb.set_cursor_frame(0).unwrap();
    assert_eq!(fb.cursor_frame(), 0);
    assert_eq!(shared.count("SetCursorImage"), 2);
}

#[test]
fn cursor_frame_bounds_are_checked() {
    let (_sys, fb, _shared) = setup("A");
    fb.open().unwrap();
    assert_eq!(fb.cursor_frame_count(), 4);
    assert_eq!(fb.set_cursor_frame(9), Err(GfxError::BadArgument));

    let dot = CursorImage {
        width: 1,
        height: 1,
        hot_spot: (0, 0),
        pixels: vec![0xff00_0000],
    };
    assert_eq!(
        fb.set_cursor_image(9, dot.clone()),
        Err(GfxError::BadArgument)
    );

    // Maior que o tamanho negociado na criação.
    let huge = CursorImage {
        width: 65,
        height: 65,
        hot_spot: (0, 0),
        pixels: vec![0xff00_0000; 65 * 65],
    };
    assert_eq!(fb.set_cursor_image(0, huge), Err(GfxError::BadArgument));
    fb.set_cursor_image(0, dot).unwrap();
}

#[test]
fn vbl_tick_updates_timestamps() {
    let (_sys, fb, _shared) = setup("A");
    fb.open().unwrap();
    fb.vbl_tick(1_000);
    fb.vbl_tick(17_666);
    assert_eq!(fb.vbl_time_us(), 17_666);
    assert_eq!(fb.vbl_delta_us(), 16_666);
}

// ============================================================================
// VRAM
// ============================================================================

#[test]
fn vram_survives_deep_sleep() {
    let sys = GraphicsSubsystem::new();
    let (drv, shared) = FakeDriver::new("A");
    let drv = drv.with_vram_loss();
    let fb = sys.create_framebuffer(Box::new(drv), config("A")).unwrap();
    fb.open().unwrap();
    fb.set_gamma_format(16, 4);

    // Checksum do padrão original (mesma fórmula do driver falso).
    let expected: u64 = (0..64usize * 4 * 32).map(|i| (i * 7 % 251) as u64).sum();

    fb.request_power_state(0).unwrap();
    assert!(fb.has_vram_snapshot());
    fb.request_power_state(2).unwrap();
    assert!(!fb.has_vram_snapshot());

    // O driver anota o checksum da VRAM na próxima chamada de gamma.
    shared.clear();
    fb.set_gamma_table(&gamma(1)).unwrap();
    assert_eq!(shared.count(&format!("vramsum {}", expected)), 1);
}

#[test]
fn wake_while_suspended_discards_snapshot() {
    let sys = GraphicsSubsystem::new();
    let (drv, _shared) = FakeDriver::new("A");
    let fb = sys
        .create_framebuffer(Box::new(drv.with_vram_loss()), config("A"))
        .unwrap();
    fb.open().unwrap();

    fb.request_power_state(0).unwrap();
    assert!(fb.has_vram_snapshot());

    // Hot-plug durante o sono: o snapshot é do display antigo.
    fb.connect_interrupt();
    sys.work().process_all();
    fb.request_power_state(2).unwrap();
    assert!(!fb.has_vram_snapshot());

    // O ack não ressuscita o snapshot (uma tentativa só).
    fb.acknowledge_connect_change().unwrap();
    assert!(!fb.has_vram_snapshot());
}

#[test]
fn mirror_secondary_skips_vram_save() {
    let sys = GraphicsSubsystem::new();
    let (da, _sa) = FakeDriver::new("A");
    let (db, _sb) = FakeDriver::new("B");
    let a = sys
        .create_framebuffer(Box::new(da.with_vram_loss()), config("A"))
        .unwrap();
    let b = sys
        .create_framebuffer(Box::new(db.with_vram_loss()), config("B"))
        .unwrap();
    a.open().unwrap();
    b.open().unwrap();
    sys.set_mirror(&a, &b).unwrap();

    a.request_power_state(0).unwrap();
    b.request_power_state(0).unwrap();
    assert!(a.has_vram_snapshot());
    assert!(!b.has_vram_snapshot());
}

// ============================================================================
// MIRROR
// ============================================================================

#[test]
fn second_mirror_request_is_busy() {
    let sys = GraphicsSubsystem::new();
    let (da, _) = FakeDriver::new("A");
    let (db, _) = FakeDriver::new("B");
    let (dc, _) = FakeDriver::new("C");
    let a = sys.register(Box::new(da), config("A")).unwrap();
    let b = sys.register(Box::new(db), config("B")).unwrap();
    let c = sys.register(Box::new(dc), config("C")).unwrap();

    sys.set_mirror(&a, &b).unwrap();
    assert!(b.is_mirror_secondary());
    assert_eq!(sys.set_mirror(&a, &c), Err(GfxError::Busy));
    assert_eq!(sys.set_mirror(&c, &b), Err(GfxError::Busy));

    sys.clear_mirror(&a);
    assert!(!b.is_mirror_secondary());
    sys.set_mirror(&a, &c).unwrap();
}
