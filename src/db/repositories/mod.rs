mod detection_events;
mod sessions;
