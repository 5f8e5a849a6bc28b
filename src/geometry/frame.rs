use nalgebra::Unit;

use super::WorldVector;

/// Orthonormal basis around a unit normal.
/// Local coordinates have the normal as the z axis.
#[derive(Copy, Clone, Debug)]
pub struct LocalFrame {
    pub tangent: WorldVector,
    pub bitangent: WorldVector,
    pub normal: WorldVector,
}

impl LocalFrame {
    /// Builds the basis without branching on the normal direction.
    /// Duff et al., "Building an Orthonormal Basis, Revisited", JCGT 2017
    pub fn new(normal: &Unit<WorldVector>) -> LocalFrame {
        let n = normal.into_inner();
        let sign = 1.0f32.copysign(n.z);
        let a = -1.0 / (sign + n.z);
        let b = n.x * n.y * a;

        LocalFrame {
            tangent: WorldVector::new(1.0 + sign * n.x * n.x * a, sign * b, -sign * n.x),
            bitangent: WorldVector::new(b, sign + n.y * n.y * a, -n.y),
            normal: n,
        }
    }

    pub fn to_world(&self, local: &WorldVector) -> WorldVector {
        self.tangent * local.x + self.bitangent * local.y + self.normal * local.z
    }

    pub fn to_local(&self, world: &WorldVector) -> WorldVector {
        WorldVector::new(
            world.dot(&self.tangent),
            world.dot(&self.bitangent),
            world.dot(&self.normal),
        )
    }
}
