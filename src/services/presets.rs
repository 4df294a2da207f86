/// Suggested instructions offered next to the free-text field.
pub const PRESETS: &[&str] = &[
    "Make the room brighter and more modern",
    "Add Scandinavian-style furniture",
    "Change the floor to light wood",
    "Remove the furniture and paint the walls white",
    "Decorate it like a luxury home",
];
