// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Well-known names used in settings, state snapshots and parameter
//! property bags. Extensions are free to add their own; these are the ones
//! the host understands.

pub mod setting_names {
    pub const HANDLE: &str = "handle";
    pub const NAME: &str = "name";
    pub const SETTINGS_DESC: &str = "settings_desc";
    pub const INSTANCE_ID: &str = "instance_id";
    pub const PREVIEW: &str = "preview";
    pub const FILENAME: &str = "filename";
    pub const RESOLUTION_X: &str = "resolution_x";
    pub const RESOLUTION_Y: &str = "resolution_y";
    pub const FRAME_RATE: &str = "frame_rate";
    pub const FORMAT: &str = "format";
    pub const SYNC_GROUP: &str = "sync_group";
    pub const LAYER_ID: &str = "layer_id";
}

pub mod state_names {
    pub const RESOLUTION_X: &str = "resolution_x";
    pub const RESOLUTION_Y: &str = "resolution_y";
    pub const FRAME_RATE: &str = "frame_rate";
    pub const PIXEL_FORMAT: &str = "pixel_format";
    pub const FORMAT: &str = "format";
    pub const COLOR_SPACE: &str = "color_space";
    pub const MPEG_RANGE: &str = "mpeg_range";
    pub const IGNORE_ALPHA: &str = "ignore_alpha";
    pub const SCALE_Y: &str = "scale_y";
    pub const AUDIO_CHANNEL_COUNT: &str = "audio_channel_count";
    pub const AUDIO_SAMPLE_RATE: &str = "audio_sample_rate";
}

pub mod parameter_names {
    pub const SAMPLER: &str = "sampler";
}

pub mod property_names {
    pub const NAME: &str = "name";

    // extension
    pub const API_VERSION: &str = "api_version";
    pub const DEPENDENCIES: &str = "dependencies";

    // stream device
    pub const CHANNEL_COUNT: &str = "channel_count";

    // input stream
    pub const LAYER_NAMES: &str = "layer_names";
    pub const LAYER_IDS: &str = "layer_ids";

    // parameter
    pub const PURPOSE: &str = "purpose";
    pub const ENUM_NAMES: &str = "enum_names";
    pub const MIN_VALUE: &str = "min_value";
    pub const MAX_VALUE: &str = "max_value";
    pub const GROUP_NAME: &str = "group_name";
    pub const ACTIVE_IN_LAYERS: &str = "active_in_layers";
    pub const DIRECTION: &str = "direction";
    pub const INTERNAL: &str = "internal";
}

pub mod purpose_names {
    pub const VISIBLE: &str = "Visible";
    pub const TIMELINE_TIME: &str = "TimelineTime";
    pub const COLOR: &str = "Color";
    pub const POSITION: &str = "Position";
    pub const ROTATION: &str = "Rotation";
    pub const SCALE: &str = "Scale";
    pub const WORLD_MATRIX: &str = "WorldMatrix";
    pub const VIEW_MATRIX: &str = "ViewMatrix";
    pub const PROJECTION_MATRIX: &str = "ProjectionMatrix";
    pub const LAYER_INDEX: &str = "LayerIndex";
    pub const FRAME_INDEX: &str = "FrameIndex";
    pub const FRAME_RATE: &str = "FrameRate";
}
