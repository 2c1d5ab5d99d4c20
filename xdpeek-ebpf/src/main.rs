#![no_std]
#![no_main]

use aya_ebpf::{
    bindings::xdp_action,
    helpers::bpf_ktime_get_ns,
    macros::{map, xdp},
    maps::{PerCpuArray, PerfEventArray},
    programs::XdpContext,
};
use xdpeek_common::{inspect, Cursor, EventSink, InspectEvent, Verdict};

#[no_mangle]
#[link_section = "license"]
pub static _license: [u8; 4] = *b"GPL\0";

/// One perf ring per CPU; a full ring drops the sample and the reader is
/// told how many were lost.
#[map]
static EVENTS: PerfEventArray<InspectEvent> = PerfEventArray::new(0);

/// Per-CPU scratch record. `InspectEvent` is too large to build comfortably
/// on the 512-byte eBPF stack next to the parser state.
#[map]
static SCRATCH: PerCpuArray<InspectEvent> = PerCpuArray::with_max_entries(1, 0);

struct PerfSink<'a> {
    ctx: &'a XdpContext,
}

impl EventSink for PerfSink<'_> {
    #[inline(always)]
    fn submit(&self, event: &InspectEvent) {
        EVENTS.output(self.ctx, event, 0);
    }
}

/// XDP entry point. Observes the frame and always lets it through.
#[xdp]
pub fn xdpeek(ctx: XdpContext) -> u32 {
    let Some(scratch) = SCRATCH.get_ptr_mut(0) else {
        return xdp_action::XDP_PASS;
    };
    // SAFETY: the slot is private to this CPU and XDP programs do not nest.
    let scratch = unsafe { &mut *scratch };

    // SAFETY: the verifier bounds every packet access to [data, data_end),
    // which is exactly what the cursor checks against.
    let frame = unsafe { Cursor::new(ctx.data(), ctx.data_end()) };
    let ts = unsafe { bpf_ktime_get_ns() };

    match inspect(frame, ts, scratch, &PerfSink { ctx: &ctx }) {
        Verdict::Pass => xdp_action::XDP_PASS,
    }
}

#[panic_handler]
fn panic(_info: &core::panic::PanicInfo) -> ! {
    unsafe { core::hint::unreachable_unchecked() }
}
