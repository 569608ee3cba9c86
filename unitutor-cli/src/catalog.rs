use serde::{Deserialize, Serialize};

/// Academic level of a programme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProgramLevel {
    Degree,
    Diploma,
    Certificate,
}

impl ProgramLevel {
    pub const ALL: [ProgramLevel; 3] = [
        ProgramLevel::Degree,
        ProgramLevel::Diploma,
        ProgramLevel::Certificate,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProgramLevel::Degree => "degree",
            ProgramLevel::Diploma => "diploma",
            ProgramLevel::Certificate => "certificate",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ProgramLevel::Degree => "Degree Programmes",
            ProgramLevel::Diploma => "Diploma Programmes",
            ProgramLevel::Certificate => "Certificate Programmes",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Course {
    pub id: &'static str,
    pub name: &'static str,
    pub short_name: &'static str,
    pub level: ProgramLevel,
    pub duration: &'static str,
    pub faculty: &'static str,
    pub description: &'static str,
}

#[derive(Debug, Clone, Copy)]
pub struct Faculty {
    pub id: &'static str,
    pub name: &'static str,
    pub short_name: &'static str,
    pub description: &'static str,
    pub courses: &'static [Course],
}

const ENGINEERING_COURSES: &[Course] = &[
    Course {
        id: "eng-elec-deg",
        name: "Bachelor of Engineering Honours in Electrical & Electronics Engineering",
        short_name: "B.Eng. Electrical",
        level: ProgramLevel::Degree,
        duration: "4-5 Years",
        faculty: "engineering",
        description: "Master electrical systems, power electronics, and control systems",
    },
    Course {
        id: "eng-civil-deg",
        name: "Bachelor of Engineering Honours in Civil & Environmental Engineering",
        short_name: "B.Eng. Civil",
        level: ProgramLevel::Degree,
        duration: "4-5 Years",
        faculty: "engineering",
        description: "Design infrastructure and sustainable solutions",
    },
    Course {
        id: "eng-renew-deg",
        name: "Bachelor of Technology in Renewable Energy",
        short_name: "B.Tech. Renewable Energy",
        level: ProgramLevel::Degree,
        duration: "4 Years",
        faculty: "engineering",
        description: "Develop sustainable energy solutions",
    },
    Course {
        id: "eng-ict-hd",
        name: "Higher Diploma in Information & Communication Technology",
        short_name: "HD ICT",
        level: ProgramLevel::Diploma,
        duration: "3 Years",
        faculty: "engineering",
        description: "ICT infrastructure and systems",
    },
    Course {
        id: "eng-mech-hd",
        name: "Higher Diploma in Mechanical Engineering",
        short_name: "HD Mechanical",
        level: ProgramLevel::Diploma,
        duration: "3 Years",
        faculty: "engineering",
        description: "Applied mechanical engineering skills",
    },
    Course {
        id: "eng-solar-tc",
        name: "Technical Certificate in Renewable Energy (Solar PV)",
        short_name: "TC Solar PV",
        level: ProgramLevel::Certificate,
        duration: "1 Year",
        faculty: "engineering",
        description: "Solar PV installation and maintenance",
    },
];

const VOCATIONAL_COURSES: &[Course] = &[
    Course {
        id: "voc-fashion-deg",
        name: "Bachelor of Science in Fashion & Design",
        short_name: "B.Sc. Fashion",
        level: ProgramLevel::Degree,
        duration: "4 Years",
        faculty: "vocational",
        description: "Fashion design and industry management",
    },
    Course {
        id: "voc-hotel-od",
        name: "Ordinary Diploma in Hotel and Tourism",
        short_name: "OD Hotel & Tourism",
        level: ProgramLevel::Diploma,
        duration: "2 Years",
        faculty: "vocational",
        description: "Hospitality and tourism management",
    },
    Course {
        id: "voc-plumb-tc",
        name: "Technical Certificate in Plumbing and Pipe Fitting",
        short_name: "TC Plumbing",
        level: ProgramLevel::Certificate,
        duration: "1 Year",
        faculty: "vocational",
        description: "Plumbing and pipe fitting skills",
    },
    Course {
        id: "voc-masonry-tc",
        name: "Technical Certificate in Masonry",
        short_name: "TC Masonry",
        level: ProgramLevel::Certificate,
        duration: "1 Year",
        faculty: "vocational",
        description: "Masonry and construction skills",
    },
];

const BUSINESS_COURSES: &[Course] = &[
    Course {
        id: "bus-acc-deg",
        name: "Bachelor of Science in Accounting and Finance",
        short_name: "B.Sc. Accounting",
        level: ProgramLevel::Degree,
        duration: "4 Years",
        faculty: "business",
        description: "Financial reporting, auditing, and corporate finance",
    },
    Course {
        id: "bus-bank-od",
        name: "Ordinary Diploma in Banking & Finance",
        short_name: "OD Banking",
        level: ProgramLevel::Diploma,
        duration: "2 Years",
        faculty: "business",
        description: "Basic banking skills",
    },
    Course {
        id: "bus-sec-od",
        name: "Ordinary Diploma in Secretarial Studies",
        short_name: "OD Secretarial",
        level: ProgramLevel::Diploma,
        duration: "2 Years",
        faculty: "business",
        description: "Secretarial and admin skills",
    },
];

const DISTANCE_COURSES: &[Course] = &[
    Course {
        id: "dist-htcs-math",
        name: "Higher Teachers Certificate Secondary - Mathematics (Distance)",
        short_name: "HTC(S) Mathematics",
        level: ProgramLevel::Certificate,
        duration: "3 Years",
        faculty: "distance",
        description: "Distance learning - Mathematics teaching",
    },
    Course {
        id: "dist-htcs-eng",
        name: "Higher Teachers Certificate Secondary - English Language (Distance)",
        short_name: "HTC(S) English",
        level: ProgramLevel::Certificate,
        duration: "3 Years",
        faculty: "distance",
        description: "Distance learning - English teaching",
    },
];

pub const FACULTIES: &[Faculty] = &[
    Faculty {
        id: "engineering",
        name: "Faculty of Engineering and Innovation",
        short_name: "Engineering",
        description: "Building the future through innovation and technology",
        courses: ENGINEERING_COURSES,
    },
    Faculty {
        id: "vocational",
        name: "Faculty of Vocational and Skills Development Studies",
        short_name: "Vocational",
        description: "Practical skills for real-world success",
        courses: VOCATIONAL_COURSES,
    },
    Faculty {
        id: "business",
        name: "Faculty of Business Studies",
        short_name: "Business",
        description: "Commerce, finance, and management education",
        courses: BUSINESS_COURSES,
    },
    Faculty {
        id: "distance",
        name: "Institute of Distance Education and Continuous Professional Development",
        short_name: "Distance Education",
        description: "Flexible learning for working professionals",
        courses: DISTANCE_COURSES,
    },
];

pub fn get_course_by_id(course_id: &str) -> Option<&'static Course> {
    FACULTIES
        .iter()
        .flat_map(|f| f.courses.iter())
        .find(|c| c.id == course_id)
}

pub fn get_faculty_by_id(faculty_id: &str) -> Option<&'static Faculty> {
    FACULTIES.iter().find(|f| f.id == faculty_id)
}

pub fn courses_by_level(level: ProgramLevel) -> Vec<&'static Course> {
    FACULTIES
        .iter()
        .flat_map(|f| f.courses.iter())
        .filter(|c| c.level == level)
        .collect()
}

pub fn faculties_by_level(level: ProgramLevel) -> Vec<&'static Faculty> {
    FACULTIES
        .iter()
        .filter(|f| f.courses.iter().any(|c| c.level == level))
        .collect()
}

pub fn courses_by_faculty_and_level(faculty_id: &str, level: ProgramLevel) -> Vec<&'static Course> {
    match get_faculty_by_id(faculty_id) {
        Some(faculty) => faculty.courses.iter().filter(|c| c.level == level).collect(),
        None => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn looks_up_courses_and_faculties_by_id() {
        let course = get_course_by_id("eng-elec-deg").unwrap();
        assert_eq!(course.short_name, "B.Eng. Electrical");
        assert_eq!(course.level, ProgramLevel::Degree);

        let faculty = get_faculty_by_id(course.faculty).unwrap();
        assert_eq!(faculty.short_name, "Engineering");

        assert!(get_course_by_id("nope").is_none());
        assert!(get_faculty_by_id("nope").is_none());
    }

    #[test]
    fn filters_by_level() {
        let degrees = courses_by_level(ProgramLevel::Degree);
        assert!(!degrees.is_empty());
        assert!(degrees.iter().all(|c| c.level == ProgramLevel::Degree));

        // Every faculty listed for a level must actually offer it.
        for faculty in faculties_by_level(ProgramLevel::Certificate) {
            assert!(faculty
                .courses
                .iter()
                .any(|c| c.level == ProgramLevel::Certificate));
        }
    }

    #[test]
    fn filters_by_faculty_and_level() {
        let courses = courses_by_faculty_and_level("engineering", ProgramLevel::Diploma);
        assert!(!courses.is_empty());
        assert!(courses
            .iter()
            .all(|c| c.faculty == "engineering" && c.level == ProgramLevel::Diploma));

        assert!(courses_by_faculty_and_level("nope", ProgramLevel::Degree).is_empty());
    }

    #[test]
    fn course_ids_are_unique() {
        let mut ids: Vec<_> = FACULTIES
            .iter()
            .flat_map(|f| f.courses.iter().map(|c| c.id))
            .collect();
        let total = ids.len();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), total);
    }
}
