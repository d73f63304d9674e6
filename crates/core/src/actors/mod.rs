//! Scene entities animated by the director: the dog rig and the hinged door.

mod dog;
mod door;

pub use dog::{DogRig, REST_HEIGHT, STAND_PITCH, WALK_END, WALK_START};
pub use door::{DoorRig, DOOR_POSITION, OPEN_YAW};
