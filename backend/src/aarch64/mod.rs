pub mod codegen;
pub mod emitter;
pub mod regs;

pub use codegen::Aarch64Emitter;
pub use regs::Reg;
