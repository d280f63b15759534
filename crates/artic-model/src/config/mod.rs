//! Voice-pack configuration: key/value files, the pack index, and the XML
//! model file reader/writer.

mod file;
mod index;
mod xml_reader;
mod xml_writer;

pub use file::ConfigFile;
pub use index::VoicePackIndex;
pub use xml_reader::{load_model_xml, parse_model_xml};
pub use xml_writer::{model_to_xml, save_model_xml};
