pub mod availability;
pub mod booking;
pub mod payment;
pub mod user;

pub use availability::{AvailabilityRecord, DayAvailability, DayStatus, TimeSlot};
pub use booking::{Booking, BookingStatus, PaymentStatus};
pub use payment::{LedgerStatus, Payment, PaymentMethod, PaymentType};
pub use user::{Role, User};
