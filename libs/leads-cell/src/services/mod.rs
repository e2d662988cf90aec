pub mod leads;

pub use leads::LeadService;
