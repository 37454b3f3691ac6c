//! End-to-end exercise of the canonical board: a TAP with an 8-bit IR, a
//! DR-side `ScanMux` keyed on that same IR register, switching between a
//! 1-bit BYPASS register and an 18-bit BSR, scanned through a loopback
//! controller.
//!
//! Mirrors the worked example in the original model's own unit test: write
//! the IR to select a path, write the newly-selected register, flip the IR
//! back to a code that still resolves to the same register, and confirm a
//! capturing write-read round-trips.

use std::sync::Arc;

use scan_model::assembly::register::Direction;
use scan_model::description::{MuxDescription, RegisterDescription, TapDescription};
use scan_model::driver::LoopbackController;
use scan_model::{BitVector, Scheduler};

struct Board {
    scheduler: Scheduler,
}

fn build_board() -> Board {
    let topology = scan_model::topology::Topology::new();

    let ir = topology.define_scan_register(
        RegisterDescription::new("IR", 8, BitVector::from_u64(0xFF, 8)).unwrap(),
        Direction::ReadWrite,
    );
    let bypass = topology.define_scan_register(
        RegisterDescription::new("BYPASS", 1, BitVector::zeros(1)).unwrap(),
        Direction::ReadWrite,
    );
    let bsr = topology.define_scan_register(
        RegisterDescription::new("BSR", 18, BitVector::zeros(18)).unwrap(),
        Direction::ReadWrite,
    );

    let mut desc = MuxDescription::new("M1", 8).unwrap();
    desc.add_entry(BitVector::from_u64(0xFF, 8), Some("BYPASS".into()), bypass).unwrap();
    desc.add_entry(BitVector::from_u64(0x02, 8), Some("BSR".into()), bsr).unwrap();
    desc.add_entry(BitVector::from_u64(0x00, 8), Some("BSR".into()), bsr).unwrap();
    let m1 = topology.define_scan_mux(desc, ir).unwrap();
    topology.wire_children(m1, &[bypass, bsr]).unwrap();

    let u1 = topology
        .define_tap(TapDescription::new("U1", 8).unwrap(), ir, m1)
        .unwrap();
    let jc1 = topology
        .define_jtag_controller_assembly("JC1", Arc::new(LoopbackController), u1)
        .unwrap();
    topology.set_root(jc1).unwrap();

    Board {
        scheduler: Scheduler::new(topology, jc1),
    }
}

#[test]
fn ir_selects_bypass_then_bsr_and_bsr_round_trips() {
    let Board { scheduler } = build_board();

    scheduler.write("U1.IR", BitVector::from_u64(0xFF, 8)).unwrap();
    scheduler.apply().unwrap();

    scheduler.write("U1.IR", BitVector::from_u64(0x02, 8)).unwrap();
    scheduler.apply().unwrap();

    scheduler.write("U1.BSR", BitVector::from_u64(0x15555, 18)).unwrap();
    scheduler.apply().unwrap();

    scheduler.write("U1.IR", BitVector::from_u64(0x00, 8)).unwrap();
    scheduler.apply().unwrap();

    scheduler.write_read("U1.BSR", BitVector::from_u64(0x15555, 18)).unwrap();
    scheduler.apply().unwrap();
    assert_eq!(scheduler.read("U1.BSR").unwrap(), BitVector::from_u64(0x15555, 18));

    scheduler.stop();
}

#[test]
fn switching_ir_back_to_a_code_that_still_resolves_to_bsr_does_not_reselect() {
    let Board { scheduler } = build_board();

    scheduler.write("U1.IR", BitVector::from_u64(0x02, 8)).unwrap();
    scheduler.apply().unwrap();
    scheduler.write_read("U1.BSR", BitVector::from_u64(0x3ffff, 18)).unwrap();
    scheduler.apply().unwrap();
    assert_eq!(scheduler.read("U1.BSR").unwrap(), BitVector::from_u64(0x3ffff, 18));

    // 0x00 is a second, distinct code the address map also resolves to BSR;
    // switching to it must not disturb BSR's already-captured value.
    scheduler.write("U1.IR", BitVector::from_u64(0x00, 8)).unwrap();
    scheduler.apply().unwrap();
    assert_eq!(scheduler.read("U1.BSR").unwrap(), BitVector::from_u64(0x3ffff, 18));

    scheduler.stop();
}
