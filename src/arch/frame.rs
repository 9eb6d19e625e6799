//! Synthetic register frame for a thread that has never run.
//!
//! Layout, lowest address first, matches what the PendSV handler pops:
//!
//! ```text
//! sp -> r4 r5 r6 r7 r8 r9 r10 r11 EXC_RETURN | r0 r1 r2 r3 r12 lr pc xPSR
//!       `------ software saved ------------'   `---- hardware frame -----'
//! ```
//!
//! General registers are seeded with recognisable patterns (`r7 = 0x07070707`)
//! so a debugger can tell a thread's first frame apart from live state.

/// Words in a saved frame.
pub const FRAME_WORDS: usize = 17;

/// Index of each slot relative to the saved stack pointer.
pub const R4: usize = 0;
pub const EXC_RETURN: usize = 8;
pub const R0: usize = 9;
pub const R12: usize = 13;
pub const LR: usize = 14;
pub const PC: usize = 15;
pub const XPSR: usize = 16;

/// Return to thread mode, process stack, basic frame.
pub const EXC_RETURN_THREAD_PSP: u32 = 0xFFFF_FFFD;

/// Thumb bit set, everything else clear.
pub const INITIAL_XPSR: u32 = 0x0100_0000;

const SOFTWARE_PATTERNS: [u32; 8] = [
    0x0404_0404,
    0x0505_0505,
    0x0606_0606,
    0x0707_0707,
    0x0808_0808,
    0x0909_0909,
    0x1010_1010,
    0x1111_1111,
];

const HARDWARE_PATTERNS: [u32; 5] = [
    0x0000_0000,
    0x0101_0101,
    0x0202_0202,
    0x0303_0303,
    0x1212_1212,
];

/// Write an initial frame at the top of `stack` and return the saved stack
/// pointer (the address of the `r4` slot).
///
/// The top is trimmed to an 8-byte boundary so the hardware frame satisfies
/// the AAPCS stack alignment on exception return. Returns `None` if the
/// region cannot hold a frame.
pub fn init_frame(stack: &mut [u32], entry: usize, exit: usize) -> Option<usize> {
    let end_addr = stack.as_ptr() as usize + stack.len() * 4;
    let mut top = stack.len();
    if end_addr % 8 != 0 {
        top = top.checked_sub(1)?;
    }
    let base = top.checked_sub(FRAME_WORDS)?;
    let frame = &mut stack[base..top];

    frame[R4..EXC_RETURN].copy_from_slice(&SOFTWARE_PATTERNS);
    frame[EXC_RETURN] = EXC_RETURN_THREAD_PSP;
    frame[R0..LR].copy_from_slice(&HARDWARE_PATTERNS);
    frame[LR] = exit as u32;
    // Exception return loads pc without interworking; keep bit 0 clear.
    frame[PC] = (entry as u32) & !1;
    frame[XPSR] = INITIAL_XPSR;

    Some(frame.as_ptr() as usize)
}
