pub mod calc;
pub mod defaults;
pub mod discover;
pub mod driver;
pub mod expand;
pub mod lexer;
pub mod math;
pub mod params;
pub mod remove;
pub mod report;
pub mod settings;
pub mod specialize;
pub mod stream;
pub mod syntax;
pub mod token;

pub type DynError = Box<dyn std::error::Error + Send + Sync>;

pub use calc::{fold_constants, simplify_calculations, simplify_numeric_calculations};
pub use discover::{template_declarations, template_instantiations, InstantiationList};
pub use driver::{fold_constants_logged, simplify_templates};
pub use lexer::{simplify_std_types, tokenize, LexError};
pub use math::MathError;
pub use params::{instantiate_match, template_parameters};
pub use report::{CollectingLogger, ErrorLogger, ErrorMessage, Severity, TracingLogger};
pub use settings::Settings;
pub use stream::TokenStream;
pub use syntax::find_unbalanced_angle_brackets;
pub use token::{Token, TokenId, TokenKind};
