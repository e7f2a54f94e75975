pub mod assistente;
pub mod comando;
pub mod convite;
pub mod documento;
pub mod eleitor;
pub mod email;
pub mod indicacao;
pub mod perfil;
pub mod webhook;

pub use assistente::*;
pub use comando::*;
pub use convite::*;
pub use documento::*;
pub use eleitor::*;
pub use email::*;
pub use indicacao::*;
pub use perfil::*;
pub use webhook::*;
