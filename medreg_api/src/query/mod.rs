mod common;
pub use self::common::Query;

mod speciality;
pub use self::speciality::SpecialitySearch;
