pub mod claude;
mod http;
pub mod openai;
pub mod traits;
pub mod util;

pub use claude::Claude;
pub use openai::OpenAi;
pub use traits::TextCompletion;
pub use util::truncate_to_char_boundary;
