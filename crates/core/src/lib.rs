pub mod shared {
    pub mod constants;
    pub mod frame;
    pub mod rectangle;
    pub mod settings;
}

pub mod capture {
    pub mod domain {
        pub mod camera;
        pub mod frame_display;
    }
    pub mod infrastructure;
}

pub mod detection {
    pub mod domain {
        pub mod face_classifier;
        pub mod face_detector;
        pub mod rectangle_grouper;
    }
    pub mod infrastructure;
}

pub mod imaging {
    pub mod frame_annotator;
    pub mod grayscale;
    pub mod region_extractor;
}

pub mod upload {
    pub mod domain {
        pub mod endpoint;
        pub mod uploader;
    }
    pub mod infrastructure;
}

pub mod session {
    pub mod capture_scheduler;
    pub mod session_controller;
    pub mod tick_logger;
}
