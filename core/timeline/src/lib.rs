pub mod dates;
pub mod decode;
pub mod error;
pub mod plan;
pub mod store;

pub use dates::{
    date_span, extract_start_date, format_day, format_range, format_with_weekday_and_holidays,
    is_date_match, next_n_day, parse_day, parse_range, same_day_previous_month, FixedHolidays,
    HolidayCalendar, NoHolidays,
};
pub use decode::{decode_events, decode_json, strip_json_fencing, OutputCleaner};
pub use error::{DecodeError, TimelineError};
pub use plan::{detailed_plan_view, leaf_names_on, plan_view};
pub use store::{filter_by_start_range, EventStore};
