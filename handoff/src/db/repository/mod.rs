mod help_requests;
mod knowledge;

pub use help_requests::HelpRequestRepository;
pub use knowledge::KnowledgeRepository;
